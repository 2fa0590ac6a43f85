use std::{collections::BTreeMap, fmt};

use serde::Serialize;

use crate::{constants::SHOPPING_LIST_TITLE, schema::CartPart};

/*
Shopping list export, one line per (ingredient, unit):

Shopping list

flour (g) - 450
salt (g) - 15
*/

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListEntry {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShoppingList {
    pub entries: Vec<ShoppingListEntry>,
}

impl ShoppingList {
    /// Sums the amounts per (name, unit), ordered by name and then unit.
    pub fn from_parts(parts: impl IntoIterator<Item = CartPart>) -> Self {
        let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
        for part in parts {
            *totals
                .entry((part.name, part.measurement_unit))
                .or_insert(0) += i64::from(part.amount);
        }

        Self {
            entries: totals
                .into_iter()
                .map(|((name, measurement_unit), amount)| ShoppingListEntry {
                    name,
                    measurement_unit,
                    amount,
                })
                .collect(),
        }
    }
}

impl fmt::Display for ShoppingListEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) - {}", self.name, self.measurement_unit, self.amount)
    }
}

impl fmt::Display for ShoppingList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{SHOPPING_LIST_TITLE}")?;
        writeln!(f)?;
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}
