use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::IndexError;
use crate::taxonomy::Taxonomy;

/// Cash account transaction types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AccountTransactionType {
    Deposit,
    Withdrawal,
    Interest,
    Dividend,
    Fee,
    Tax,
    Buy,  // cash leg of a security purchase
    Sell, // cash leg of a security sale
    TransferIn,
    TransferOut,
}

impl AccountTransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountTransactionType::Deposit => "DEPOSIT",
            AccountTransactionType::Withdrawal => "WITHDRAWAL",
            AccountTransactionType::Interest => "INTEREST",
            AccountTransactionType::Dividend => "DIVIDEND",
            AccountTransactionType::Fee => "FEE",
            AccountTransactionType::Tax => "TAX",
            AccountTransactionType::Buy => "BUY",
            AccountTransactionType::Sell => "SELL",
            AccountTransactionType::TransferIn => "TRANSFER_IN",
            AccountTransactionType::TransferOut => "TRANSFER_OUT",
        }
    }

    /// Whether the amount increases the cash balance
    pub fn is_credit(&self) -> bool {
        matches!(
            self,
            AccountTransactionType::Deposit
                | AccountTransactionType::Interest
                | AccountTransactionType::Dividend
                | AccountTransactionType::Sell
                | AccountTransactionType::TransferIn
        )
    }
}

impl FromStr for AccountTransactionType {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEPOSIT" => Ok(AccountTransactionType::Deposit),
            "WITHDRAWAL" | "REMOVAL" => Ok(AccountTransactionType::Withdrawal),
            "INTEREST" => Ok(AccountTransactionType::Interest),
            "DIVIDEND" | "DIVIDENDS" => Ok(AccountTransactionType::Dividend),
            "FEE" | "FEES" => Ok(AccountTransactionType::Fee),
            "TAX" | "TAXES" => Ok(AccountTransactionType::Tax),
            "BUY" => Ok(AccountTransactionType::Buy),
            "SELL" => Ok(AccountTransactionType::Sell),
            "TRANSFER_IN" => Ok(AccountTransactionType::TransferIn),
            "TRANSFER_OUT" => Ok(AccountTransactionType::TransferOut),
            other => Err(IndexError::UnknownTransactionType(other.to_string())),
        }
    }
}

/// Securities portfolio transaction types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PortfolioTransactionType {
    Buy,
    Sell,
    TransferIn,  // inbound delivery
    TransferOut, // outbound delivery
}

impl PortfolioTransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortfolioTransactionType::Buy => "BUY",
            PortfolioTransactionType::Sell => "SELL",
            PortfolioTransactionType::TransferIn => "TRANSFER_IN",
            PortfolioTransactionType::TransferOut => "TRANSFER_OUT",
        }
    }

    /// Whether the transaction adds shares to the portfolio
    pub fn is_inbound(&self) -> bool {
        matches!(
            self,
            PortfolioTransactionType::Buy | PortfolioTransactionType::TransferIn
        )
    }
}

impl FromStr for PortfolioTransactionType {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(PortfolioTransactionType::Buy),
            "SELL" => Ok(PortfolioTransactionType::Sell),
            "TRANSFER_IN" | "DELIVERY_INBOUND" => Ok(PortfolioTransactionType::TransferIn),
            "TRANSFER_OUT" | "DELIVERY_OUTBOUND" => Ok(PortfolioTransactionType::TransferOut),
            other => Err(IndexError::UnknownTransactionType(other.to_string())),
        }
    }
}

/// Cash movement on an account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountTransaction {
    pub date: NaiveDate,
    pub transaction_type: AccountTransactionType,
    pub amount: Decimal,
}

impl AccountTransaction {
    /// Amount signed by its effect on the cash balance
    pub fn signed_amount(&self) -> Decimal {
        if self.transaction_type.is_credit() {
            self.amount
        } else {
            -self.amount
        }
    }
}

/// Share movement in a portfolio
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioTransaction {
    pub date: NaiveDate,
    pub security: Uuid,
    pub transaction_type: PortfolioTransactionType,
    pub quantity: Decimal,
    pub price: Decimal,
    pub fees: Decimal,
    pub taxes: Decimal,
}

impl PortfolioTransaction {
    /// Quantity signed by its effect on the holding
    pub fn signed_quantity(&self) -> Decimal {
        if self.transaction_type.is_inbound() {
            self.quantity
        } else {
            -self.quantity
        }
    }

    /// Cash settled for the trade: gross value plus costs when acquiring,
    /// gross value minus costs when disposing.
    pub fn settlement_amount(&self) -> Decimal {
        let gross = self.quantity * self.price;
        if self.transaction_type.is_inbound() {
            gross + self.fees + self.taxes
        } else {
            gross - self.fees - self.taxes
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Security {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub transactions: Vec<AccountTransaction>,
}

impl Account {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            transactions: Vec::new(),
        }
    }

    pub fn add_transaction(
        &mut self,
        date: NaiveDate,
        transaction_type: AccountTransactionType,
        amount: Decimal,
    ) {
        self.transactions.push(AccountTransaction {
            date,
            transaction_type,
            amount,
        });
    }

    /// Cash balance at the end of `date`
    pub fn balance_at(&self, date: NaiveDate) -> Decimal {
        self.transactions
            .iter()
            .filter(|t| t.date <= date)
            .map(AccountTransaction::signed_amount)
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Portfolio {
    pub id: Uuid,
    pub name: String,
    pub reference_account: Option<Uuid>,
    pub transactions: Vec<PortfolioTransaction>,
}

impl Portfolio {
    pub fn new(name: &str, reference_account: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            reference_account,
            transactions: Vec::new(),
        }
    }

    pub fn add_transaction(&mut self, transaction: PortfolioTransaction) {
        self.transactions.push(transaction);
    }

    /// Shares of `security` held at the end of `date`
    pub fn quantity_at(&self, security: Uuid, date: NaiveDate) -> Decimal {
        self.transactions
            .iter()
            .filter(|t| t.security == security && t.date <= date)
            .map(PortfolioTransaction::signed_quantity)
            .sum()
    }
}

/// Immutable snapshot of everything an investor owns
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Client {
    pub accounts: Vec<Account>,
    pub portfolios: Vec<Portfolio>,
    pub securities: Vec<Security>,
    #[serde(default)]
    pub taxonomies: Vec<Taxonomy>,
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_account(&mut self, account: Account) -> Uuid {
        let id = account.id;
        self.accounts.push(account);
        id
    }

    pub fn add_portfolio(&mut self, portfolio: Portfolio) -> Uuid {
        let id = portfolio.id;
        self.portfolios.push(portfolio);
        id
    }

    pub fn add_security(&mut self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.securities.push(Security {
            id,
            name: name.to_string(),
        });
        id
    }

    pub fn account_mut(&mut self, id: Uuid) -> Option<&mut Account> {
        self.accounts.iter_mut().find(|a| a.id == id)
    }

    pub fn security(&self, id: Uuid) -> Option<&Security> {
        self.securities.iter().find(|s| s.id == id)
    }

    /// Display name of a security, falling back to its id
    pub fn security_name(&self, id: Uuid) -> String {
        self.security(id)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Record a purchase: shares into the portfolio, settlement out of
    /// the portfolio's reference account.
    pub fn buy(&mut self, portfolio: Uuid, transaction: PortfolioTransaction) -> anyhow::Result<()> {
        self.record_trade(portfolio, transaction, AccountTransactionType::Buy)
    }

    /// Record a sale: shares out of the portfolio, proceeds into the
    /// portfolio's reference account.
    pub fn sell(&mut self, portfolio: Uuid, transaction: PortfolioTransaction) -> anyhow::Result<()> {
        self.record_trade(portfolio, transaction, AccountTransactionType::Sell)
    }

    fn record_trade(
        &mut self,
        portfolio_id: Uuid,
        transaction: PortfolioTransaction,
        cash_leg: AccountTransactionType,
    ) -> anyhow::Result<()> {
        let portfolio_idx = self
            .portfolios
            .iter()
            .position(|p| p.id == portfolio_id)
            .ok_or_else(|| anyhow::anyhow!("Unknown portfolio {}", portfolio_id))?;
        let portfolio = &self.portfolios[portfolio_idx];
        let account_id = portfolio.reference_account.ok_or_else(|| {
            anyhow::anyhow!("Portfolio '{}' has no reference account", portfolio.name)
        })?;
        let account_idx = self
            .accounts
            .iter()
            .position(|a| a.id == account_id)
            .ok_or_else(|| anyhow::anyhow!("Unknown reference account {}", account_id))?;

        self.accounts[account_idx].add_transaction(
            transaction.date,
            cash_leg,
            transaction.settlement_amount(),
        );
        self.portfolios[portfolio_idx].add_transaction(transaction);
        Ok(())
    }

    /// Earliest transaction date across all accounts and portfolios
    pub fn first_transaction_date(&self) -> Option<NaiveDate> {
        let account_dates = self
            .accounts
            .iter()
            .flat_map(|a| a.transactions.iter().map(|t| t.date));
        let portfolio_dates = self
            .portfolios
            .iter()
            .flat_map(|p| p.transactions.iter().map(|t| t.date));
        account_dates.chain(portfolio_dates).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn trade(
        date: NaiveDate,
        security: Uuid,
        transaction_type: PortfolioTransactionType,
        quantity: Decimal,
        price: Decimal,
        fees: Decimal,
    ) -> PortfolioTransaction {
        PortfolioTransaction {
            date,
            security,
            transaction_type,
            quantity,
            price,
            fees,
            taxes: Decimal::ZERO,
        }
    }

    #[test]
    fn test_transaction_type_parsing() {
        assert_eq!(
            "withdrawal".parse::<AccountTransactionType>().unwrap(),
            AccountTransactionType::Withdrawal
        );
        assert_eq!(
            "REMOVAL".parse::<AccountTransactionType>().unwrap(),
            AccountTransactionType::Withdrawal
        );
        assert_eq!(
            "delivery_inbound".parse::<PortfolioTransactionType>().unwrap(),
            PortfolioTransactionType::TransferIn
        );
        assert!("INTEREST".parse::<PortfolioTransactionType>().is_err());
        for t in [
            AccountTransactionType::Deposit,
            AccountTransactionType::TransferOut,
            AccountTransactionType::Tax,
        ] {
            assert_eq!(t.as_str().parse::<AccountTransactionType>().unwrap(), t);
        }
    }

    #[test]
    fn test_account_balance_follows_transaction_signs() {
        let mut account = Account::new("Cash");
        account.add_transaction(date(2012, 1, 1), AccountTransactionType::Deposit, dec!(1000));
        account.add_transaction(date(2012, 1, 2), AccountTransactionType::Fee, dec!(10));
        account.add_transaction(date(2012, 1, 3), AccountTransactionType::Interest, dec!(5));
        account.add_transaction(date(2012, 1, 3), AccountTransactionType::Withdrawal, dec!(100));

        assert_eq!(account.balance_at(date(2011, 12, 31)), dec!(0));
        assert_eq!(account.balance_at(date(2012, 1, 2)), dec!(990));
        assert_eq!(account.balance_at(date(2012, 1, 3)), dec!(895));
    }

    #[test]
    fn test_buy_and_sell_write_both_legs() {
        let mut client = Client::new();
        let account = client.add_account(Account::new("Broker cash"));
        let portfolio = client.add_portfolio(Portfolio::new("Broker", Some(account)));
        let acme = client.add_security("ACME");

        client
            .buy(
                portfolio,
                trade(date(2012, 1, 2), acme, PortfolioTransactionType::Buy, dec!(10), dec!(20), dec!(5)),
            )
            .unwrap();
        client
            .sell(
                portfolio,
                trade(date(2012, 1, 5), acme, PortfolioTransactionType::Sell, dec!(4), dec!(25), dec!(2)),
            )
            .unwrap();

        let cash = &client.accounts[0];
        assert_eq!(cash.transactions[0].amount, dec!(205));
        assert_eq!(cash.transactions[1].amount, dec!(98));
        assert_eq!(cash.balance_at(date(2012, 1, 5)), dec!(-107));

        let holding = &client.portfolios[0];
        assert_eq!(holding.quantity_at(acme, date(2012, 1, 4)), dec!(10));
        assert_eq!(holding.quantity_at(acme, date(2012, 1, 5)), dec!(6));
        assert_eq!(client.first_transaction_date(), Some(date(2012, 1, 2)));
    }

    #[test]
    fn test_trade_without_reference_account_is_rejected() {
        let mut client = Client::new();
        let portfolio = client.add_portfolio(Portfolio::new("Orphan", None));
        let acme = client.add_security("ACME");

        let result = client.buy(
            portfolio,
            trade(date(2012, 1, 2), acme, PortfolioTransactionType::Buy, dec!(1), dec!(1), dec!(0)),
        );
        assert!(result.is_err());
        assert!(client.portfolios[0].transactions.is_empty());
    }

    #[test]
    fn test_empty_client_has_no_first_transaction() {
        assert_eq!(Client::new().first_transaction_date(), None);
    }
}
