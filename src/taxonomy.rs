//! Classification trees over investment vehicles
//!
//! A taxonomy owns a root classification; every classification owns its
//! children and the assignments of accounts or securities to it. Traversal
//! is an explicit depth-first worklist, so no parent pointers are needed.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Something that can be classified
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum InvestmentVehicle {
    Security(Uuid),
    Account(Uuid),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assignment {
    pub vehicle: InvestmentVehicle,
    pub weight: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Classification {
    pub id: String,
    pub name: String,
    pub weight: Decimal,
    pub children: Vec<Classification>,
    pub assignments: Vec<Assignment>,
}

impl Classification {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            weight: Decimal::ONE_HUNDRED,
            children: Vec::new(),
            assignments: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: Classification) -> Self {
        self.children.push(child);
        self
    }

    pub fn assign(mut self, vehicle: InvestmentVehicle, weight: Decimal) -> Self {
        self.assignments.push(Assignment { vehicle, weight });
        self
    }
}

/// Item yielded by [`Taxonomy::walk`]
#[derive(Debug, Clone, Copy)]
pub enum Visit<'a> {
    Classification(&'a Classification),
    Assignment(&'a Classification, &'a Assignment),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Taxonomy {
    pub id: String,
    pub name: String,
    pub dimensions: Vec<String>,
    pub root: Classification,
}

impl Taxonomy {
    pub fn new(id: &str, name: &str, root: Classification) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            dimensions: Vec::new(),
            root,
        }
    }

    /// Visit every classification (root included) and every assignment,
    /// depth-first in declaration order. A classification is visited
    /// before its own assignments and children.
    pub fn walk<'a>(&'a self, mut visitor: impl FnMut(Visit<'a>)) {
        let mut stack: Vec<&'a Classification> = vec![&self.root];
        while let Some(node) = stack.pop() {
            visitor(Visit::Classification(node));
            for assignment in &node.assignments {
                visitor(Visit::Assignment(node, assignment));
            }
            stack.extend(node.children.iter().rev());
        }
    }

    /// Find a classification below the root by id
    pub fn classification_by_id(&self, id: &str) -> Option<&Classification> {
        let mut queue: std::collections::VecDeque<&Classification> =
            self.root.children.iter().collect();
        while let Some(node) = queue.pop_front() {
            if node.id == id {
                return Some(node);
            }
            queue.extend(node.children.iter());
        }
        None
    }

    /// All classifications the vehicle is assigned to
    pub fn classifications_for(&self, vehicle: InvestmentVehicle) -> Vec<&Classification> {
        let mut found = Vec::new();
        self.walk(|visit| {
            if let Visit::Assignment(classification, assignment) = visit {
                if assignment.vehicle == vehicle {
                    found.push(classification);
                }
            }
        });
        found
    }

    /// Number of levels, counting the root as one
    pub fn height(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(&self.root, 1usize)];
        while let Some((node, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            stack.extend(node.children.iter().map(|c| (c, depth + 1)));
        }
        max_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn asset_classes(acme: Uuid, cash: Uuid) -> Taxonomy {
        let root = Classification::new("root", "Asset Classes")
            .with_child(
                Classification::new("equity", "Equity")
                    .with_child(
                        Classification::new("equity-us", "US Equity")
                            .assign(InvestmentVehicle::Security(acme), dec!(60)),
                    )
                    .with_child(
                        Classification::new("equity-eu", "EU Equity")
                            .assign(InvestmentVehicle::Security(acme), dec!(40)),
                    ),
            )
            .with_child(
                Classification::new("cash", "Cash")
                    .assign(InvestmentVehicle::Account(cash), dec!(100)),
            );
        Taxonomy::new("asset-classes", "Asset Classes", root)
    }

    #[test]
    fn test_lookup_by_id_searches_whole_tree() {
        let taxonomy = asset_classes(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(
            taxonomy.classification_by_id("equity-eu").map(|c| c.name.as_str()),
            Some("EU Equity")
        );
        assert!(taxonomy.classification_by_id("bonds").is_none());
        // the root itself is not addressable
        assert!(taxonomy.classification_by_id("root").is_none());
    }

    #[test]
    fn test_classifications_for_vehicle() {
        let acme = Uuid::new_v4();
        let cash = Uuid::new_v4();
        let taxonomy = asset_classes(acme, cash);

        let ids: Vec<&str> = taxonomy
            .classifications_for(InvestmentVehicle::Security(acme))
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids, vec!["equity-us", "equity-eu"]);

        assert_eq!(
            taxonomy
                .classifications_for(InvestmentVehicle::Account(cash))
                .len(),
            1
        );
        assert!(taxonomy
            .classifications_for(InvestmentVehicle::Account(acme))
            .is_empty());
    }

    #[test]
    fn test_height_and_walk_order() {
        let taxonomy = asset_classes(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(taxonomy.height(), 3);

        let mut order = Vec::new();
        taxonomy.walk(|visit| {
            if let Visit::Classification(c) = visit {
                order.push(c.id.clone());
            }
        });
        assert_eq!(order, vec!["root", "equity", "equity-us", "equity-eu", "cash"]);
    }

    #[test]
    fn test_single_node_taxonomy_has_height_one() {
        let taxonomy = Taxonomy::new("t", "Flat", Classification::new("root", "Root"));
        assert_eq!(taxonomy.height(), 1);
    }
}
