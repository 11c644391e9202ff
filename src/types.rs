use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A sampled location. Always satisfies the containment test of the
/// region it was drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneratedPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeneratedPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// One row of the order table. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub type_user: UserType,
    pub category_name: Category,
    pub ship_date: NaiveDate,
    pub price_of_order: u64,
    pub type_of_payment: PaymentType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownValue {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownValue {}

// Closed value sets stored as their literal labels in the table.
macro_rules! value_set {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownValue;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| UnknownValue { kind: $kind, value: s.to_string() })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

value_set! {
    /// Customer legal form.
    UserType, "user type" {
        LegalEntity => "ЮЛ",
        SoleProprietor => "ИП",
        Individual => "ФЛ",
    }
}

value_set! {
    /// Product category of an order.
    Category, "category" {
        Beverages => "Напитки",
        Condiments => "Приправы и соусы",
        Confectionery => "Кондитерские изделия",
        Dairy => "Молочные продукты",
        Grains => "Крупы и злаки",
        MeatPoultry => "Мясо и птица",
        Produce => "Овощи и фрукты",
        Seafood => "Морепродукты",
    }
}

value_set! {
    PaymentType, "payment type" {
        Cash => "Наличные",
        Card => "Карта",
        QrCode => "QR-код",
        Credit => "Кредит",
        Invoice => "Счёт",
    }
}

impl UserType {
    /// Businesses settle by invoice; only individuals pay directly.
    pub fn pays_by_invoice(self) -> bool {
        matches!(self, UserType::LegalEntity | UserType::SoleProprietor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_from_str() {
        for c in Category::ALL {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), *c);
        }
        assert_eq!("QR-код".parse::<PaymentType>().unwrap(), PaymentType::QrCode);
    }

    #[test]
    fn unknown_label_is_rejected() {
        let err = "Bitcoin".parse::<PaymentType>().unwrap_err();
        assert_eq!(err.kind, "payment type");
        assert_eq!(err.to_string(), "unknown payment type 'Bitcoin'");
    }

    #[test]
    fn serializes_as_label() {
        let json = serde_json::to_string(&UserType::Individual).unwrap();
        assert_eq!(json, "\"ФЛ\"");
        let back: UserType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, UserType::Individual);
    }

    #[test]
    fn invoice_rule_follows_user_type() {
        assert!(UserType::LegalEntity.pays_by_invoice());
        assert!(UserType::SoleProprietor.pays_by_invoice());
        assert!(!UserType::Individual.pays_by_invoice());
    }
}
