//! Volume units and printed size parsing.
//!
//! Package sizes arrive as printed strings ("750ml", "1.75L", "12/750ml").
//! Everything is normalized to millilitres for storage and to fluid ounces
//! for price comparison.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Millilitres per US fluid ounce
pub const ML_PER_OZ: f64 = 29.5735;

const ML_PER_LITER: f64 = 1000.0;

lazy_static! {
    /// `N/SIZE[unit]`, e.g. "12/750ml"
    static ref MULTIPACK_REGEX: Regex = Regex::new(
        r"^(\d+)\s*/\s*(\d+(?:\.\d+)?)\s*([a-z]+)?$"
    ).unwrap();

    /// `SIZE[unit]`, e.g. "750", "1.75l", "50 ml"
    static ref SIZE_REGEX: Regex = Regex::new(
        r"^(\d+(?:\.\d+)?|\.\d+)\s*([a-z]+)?$"
    ).unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Ml,
    Oz,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Ml => "ml",
            Unit::Oz => "oz",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ml" => Some(Unit::Ml),
            "oz" => Some(Unit::Oz),
            _ => None,
        }
    }

    pub fn all() -> [Unit; 2] {
        [Unit::Oz, Unit::Ml]
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A measured quantity of liquid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Amount {
    pub unit: Unit,
    pub quantity: f64,
}

impl Amount {
    pub fn new(unit: Unit, quantity: f64) -> Self {
        Self { unit, quantity }
    }

    pub fn oz(quantity: f64) -> Self {
        Self::new(Unit::Oz, quantity)
    }

    pub fn to_oz(&self) -> f64 {
        match self.unit {
            Unit::Oz => self.quantity,
            Unit::Ml => self.quantity / ML_PER_OZ,
        }
    }

    pub fn to_ml(&self) -> f64 {
        match self.unit {
            Unit::Oz => self.quantity * ML_PER_OZ,
            Unit::Ml => self.quantity,
        }
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.quantity, self.unit)
    }
}

/// Millilitres in one of the given unit word, if it is a known unit
fn unit_multiplier(unit: &str) -> Option<f64> {
    match unit {
        "ml" => Some(1.0),
        "l" | "liter" | "liters" | "litre" | "litres" => Some(ML_PER_LITER),
        "oz" | "ounce" | "ounces" => Some(ML_PER_OZ),
        _ => None,
    }
}

/// Parse a printed package size into millilitres.
///
/// Bare numbers are millilitres. Multipacks (`N/SIZEunit`) are the total of
/// all packs. Returns `None` for anything that does not describe a positive
/// volume, so callers can exclude the size instead of failing.
pub fn parse_size_ml(size: &str) -> Option<f64> {
    let normalized = size.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }

    if let Some(multiplier) = unit_multiplier(&normalized) {
        return Some(multiplier);
    }

    let ml = if let Some(caps) = MULTIPACK_REGEX.captures(&normalized) {
        let packs: f64 = caps[1].parse().ok()?;
        let each: f64 = caps[2].parse().ok()?;
        let multiplier = match caps.get(3) {
            Some(unit) => unit_multiplier(unit.as_str())?,
            None => 1.0,
        };
        packs * each * multiplier
    } else if let Some(caps) = SIZE_REGEX.captures(&normalized) {
        let value: f64 = caps[1].parse().ok()?;
        let multiplier = match caps.get(2) {
            Some(unit) => unit_multiplier(unit.as_str())?,
            None => 1.0,
        };
        value * multiplier
    } else {
        return None;
    };

    if ml.is_finite() && ml > 0.0 {
        Some(ml)
    } else {
        None
    }
}

/// Parse a printed size into fluid ounces
pub fn parse_size_oz(size: &str) -> Option<f64> {
    parse_size_ml(size).map(|ml| ml / ML_PER_OZ)
}

/// Parse a recipe amount such as "1oz", "1.5 oz" or "30ml".
///
/// Bare numbers are taken as ounces, the unit recipes are written in.
pub fn parse_amount(amount: &str) -> Option<Amount> {
    let normalized = amount.trim().to_lowercase();
    let caps = SIZE_REGEX.captures(&normalized)?;
    let quantity: f64 = caps[1].parse().ok()?;
    if !quantity.is_finite() || quantity <= 0.0 {
        return None;
    }
    match caps.get(2).map(|m| m.as_str()) {
        None | Some("oz") | Some("ounce") | Some("ounces") => Some(Amount::oz(quantity)),
        Some(unit) => {
            let ml = quantity * unit_multiplier(unit)?;
            Some(Amount::new(Unit::Ml, ml))
        }
    }
}

/// Price per fluid ounce of a package holding `quantity_ml`
pub fn unit_price_per_oz(price: f64, quantity_ml: f64) -> f64 {
    if quantity_ml <= 0.0 {
        return 0.0;
    }
    price / (quantity_ml / ML_PER_OZ)
}

/// Render a millilitre quantity the way price lists print it
pub fn format_ml(quantity_ml: f64) -> String {
    if quantity_ml >= ML_PER_LITER && (quantity_ml % 10.0).abs() < f64::EPSILON {
        format!("{}L", quantity_ml / ML_PER_LITER)
    } else {
        format!("{}ml", quantity_ml)
    }
}
