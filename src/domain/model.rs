use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Shown when the source has no dishes for today.
pub const HOLIDAY_MESSAGE: &str = "Сегодня тут пусто";
/// Shown when validation rejected the menu without a message of its own.
pub const UNAVAILABLE_MESSAGE: &str = "Сегодня меню недоступно";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cafeteria {
    Peony,
    Azilea,
}

impl Cafeteria {
    pub const ALL: [Cafeteria; 2] = [Cafeteria::Peony, Cafeteria::Azilea];

    /// Stable key used for persistence and configuration.
    pub fn key(&self) -> &'static str {
        match self {
            Cafeteria::Peony => "peony",
            Cafeteria::Azilea => "azilea",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Cafeteria::Peony => "Peony (нижняя)",
            Cafeteria::Azilea => "Azilea (верхняя)",
        }
    }
}

impl fmt::Display for Cafeteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Cafeteria {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "peony" => Ok(Cafeteria::Peony),
            "azilea" => Ok(Cafeteria::Azilea),
            other => Err(format!("unknown cafeteria '{}'", other)),
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub spiciness: u8,
    #[serde(default, skip_serializing_if = "is_false")]
    pub placeholder: bool,
}

impl MenuItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            spiciness: 0,
            placeholder: false,
        }
    }

    pub fn placeholder(message: impl Into<String>) -> Self {
        Self {
            placeholder: true,
            ..Self::new(message)
        }
    }

    pub fn is_enriched(&self) -> bool {
        !self.description.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Menu {
    pub items: Vec<MenuItem>,
    pub as_of_date: NaiveDate,
}

impl Menu {
    pub fn new(items: Vec<MenuItem>, as_of_date: NaiveDate) -> Self {
        Self { items, as_of_date }
    }

    pub fn from_dishes<I, S>(dishes: I, as_of_date: NaiveDate) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(dishes.into_iter().map(MenuItem::new).collect(), as_of_date)
    }

    /// Empty-menu sentinel: exactly one placeholder item carrying `message`.
    pub fn empty(message: &str, as_of_date: NaiveDate) -> Self {
        let message = if message.trim().is_empty() {
            UNAVAILABLE_MESSAGE
        } else {
            message
        };
        Self::new(vec![MenuItem::placeholder(message)], as_of_date)
    }

    pub fn is_empty_sentinel(&self) -> bool {
        self.items.len() == 1 && self.items[0].placeholder
    }

    pub fn is_same_day(&self, other: &Menu) -> bool {
        self.as_of_date == other.as_of_date
    }

    pub fn dish_names(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.name.as_str()).collect()
    }
}

impl fmt::Display for Menu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty_sentinel() {
            return f.write_str(&self.items[0].name);
        }

        for (i, item) in self.items.iter().enumerate() {
            write!(f, "{}) {}", i + 1, item.name)?;
            if !item.description.is_empty() {
                write!(f, " - {}", item.description)?;
            }
            if item.spiciness > 0 {
                write!(f, " {}", "🌶".repeat(item.spiciness as usize))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MenuValidationResult {
    pub is_valid: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub reason: String,
}
