//! Recipe cost-combination calculator
//!
//! Given a recipe's slots, each accepting several brands, this enumerates
//! every way of sourcing the recipe with one brand per slot and ranks the
//! results by total cost. Each brand is priced at its cheapest size per
//! ounce.
//!
//! The enumeration is O(∏ options per slot); inputs beyond
//! [`MAX_COMBINATIONS`] are rejected before any work is done.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use super::units::{parse_size_oz, Amount};

/// Upper bound on enumerated combinations per calculation
pub const MAX_COMBINATIONS: usize = 10_000;

#[derive(Debug, Error, PartialEq)]
pub enum CalculatorError {
    #[error("Menu price must be a positive amount, got {0}")]
    InvalidMenuPrice(f64),

    #[error("Desired margin must be between 0 and 100 percent, got {0}")]
    InvalidMargin(f64),

    #[error("Recipe has {count} brand combinations, more than the limit of {limit}")]
    TooManyCombinations { count: String, limit: usize },
}

/// A package size as printed on a price list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSize {
    /// Printed size, e.g. "750ml"
    pub size: String,
    pub sale_price: f64,
}

/// A purchasable brand of an ingredient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brand {
    pub id: String,
    pub name: String,
    pub sizes: Vec<PackageSize>,
}

/// One ingredient line of a recipe with its acceptable brands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub label: String,
    pub amount: Amount,
    pub brands: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BrandCost {
    pub brand_id: String,
    pub brand_name: String,
    pub size_used: String,
    pub price_per_oz: f64,
    pub total_cost: f64,
    /// Sale price of the package used
    pub unit_price: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngredientCost {
    pub label: String,
    pub amount: Amount,
    pub brand_options: Vec<BrandCost>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CostBreakdown {
    pub brand_name: String,
    pub cost: f64,
    pub size_used: String,
    pub unit_price: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuggestedPrice {
    pub price: f64,
    pub profit_margin: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeCost {
    pub total_cost: f64,
    pub menu_price: f64,
    pub profit: f64,
    /// Percentage of the menu price
    pub profit_margin: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_price: Option<SuggestedPrice>,
    pub breakdown: Vec<CostBreakdown>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Combinations {
    pub recipe_costs: Vec<RecipeCost>,
    pub ingredient_costs: Vec<IngredientCost>,
}

/// Pricing inputs applied to every combination
#[derive(Debug, Clone, Copy)]
pub struct Pricing {
    pub menu_price: f64,
    pub desired_margin: Option<f64>,
}

impl Pricing {
    pub fn new(menu_price: f64) -> Self {
        Self {
            menu_price,
            desired_margin: None,
        }
    }

    pub fn with_desired_margin(mut self, margin: f64) -> Self {
        self.desired_margin = Some(margin);
        self
    }

    fn validate(&self) -> Result<(), CalculatorError> {
        if !self.menu_price.is_finite() || self.menu_price <= 0.0 {
            return Err(CalculatorError::InvalidMenuPrice(self.menu_price));
        }
        if let Some(margin) = self.desired_margin {
            if !margin.is_finite() || !(0.0..100.0).contains(&margin) {
                return Err(CalculatorError::InvalidMargin(margin));
            }
        }
        Ok(())
    }
}

/// Cheapest size of a brand by price per ounce, with that price.
///
/// Sizes whose printed string does not parse are skipped. The first size
/// wins ties.
pub fn cheapest_size(brand: &Brand) -> Option<(&PackageSize, f64)> {
    let mut best: Option<(&PackageSize, f64)> = None;
    for size in &brand.sizes {
        let Some(oz) = parse_size_oz(&size.size) else {
            tracing::trace!(brand = %brand.name, size = %size.size, "Skipping unparseable size");
            continue;
        };
        if !size.sale_price.is_finite() || size.sale_price < 0.0 {
            continue;
        }
        let price_per_oz = size.sale_price / oz;
        match best {
            Some((_, current)) if current <= price_per_oz => {}
            _ => best = Some((size, price_per_oz)),
        }
    }
    best
}

/// Price every slot's candidate brands
pub fn ingredient_costs(slots: &[Slot], catalog: &[Brand]) -> Vec<IngredientCost> {
    let by_id: HashMap<&str, &Brand> = catalog.iter().map(|b| (b.id.as_str(), b)).collect();

    slots
        .iter()
        .map(|slot| {
            let amount_oz = slot.amount.to_oz();
            let brand_options = slot
                .brands
                .iter()
                .filter_map(|id| by_id.get(id.as_str()).copied())
                .filter_map(|brand| {
                    let (size, price_per_oz) = cheapest_size(brand)?;
                    Some(BrandCost {
                        brand_id: brand.id.clone(),
                        brand_name: brand.name.clone(),
                        size_used: size.size.clone(),
                        price_per_oz,
                        total_cost: price_per_oz * amount_oz,
                        unit_price: size.sale_price,
                    })
                })
                .collect();

            IngredientCost {
                label: slot.label.clone(),
                amount: slot.amount,
                brand_options,
            }
        })
        .collect()
}

/// Number of combinations the slots expand to, or `None` on overflow
pub fn combination_count(ingredient_costs: &[IngredientCost]) -> Option<usize> {
    if ingredient_costs.is_empty() {
        return Some(0);
    }
    ingredient_costs
        .iter()
        .try_fold(1usize, |acc, ic| acc.checked_mul(ic.brand_options.len()))
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn price_combination(choice: &[&BrandCost], pricing: &Pricing) -> RecipeCost {
    let total_cost: f64 = choice.iter().map(|b| b.total_cost).sum();
    let profit = pricing.menu_price - total_cost;
    let profit_margin = profit / pricing.menu_price * 100.0;

    let suggested_price = pricing.desired_margin.map(|margin| {
        let price = total_cost / (1.0 - margin / 100.0);
        SuggestedPrice {
            price: round_cents(price),
            profit_margin: round_cents(margin),
            profit: round_cents(price - total_cost),
        }
    });

    RecipeCost {
        total_cost,
        menu_price: pricing.menu_price,
        profit,
        profit_margin,
        suggested_price,
        breakdown: choice
            .iter()
            .map(|b| CostBreakdown {
                brand_name: b.brand_name.clone(),
                cost: b.total_cost,
                size_used: b.size_used.clone(),
                unit_price: b.unit_price,
            })
            .collect(),
    }
}

/// Enumerate and rank every brand combination for a recipe.
///
/// A slot without any usable brand makes the recipe unsourceable and yields
/// no combinations.
pub fn calculate(
    slots: &[Slot],
    catalog: &[Brand],
    pricing: Pricing,
) -> Result<Combinations, CalculatorError> {
    pricing.validate()?;

    let ingredient_costs = ingredient_costs(slots, catalog);

    let count = combination_count(&ingredient_costs).ok_or_else(|| {
        CalculatorError::TooManyCombinations {
            count: "more than usize::MAX".to_string(),
            limit: MAX_COMBINATIONS,
        }
    })?;
    if count > MAX_COMBINATIONS {
        return Err(CalculatorError::TooManyCombinations {
            count: count.to_string(),
            limit: MAX_COMBINATIONS,
        });
    }

    let mut recipe_costs = Vec::with_capacity(count);
    if count > 0 {
        // Odometer over option indices; the last slot turns fastest
        let mut indices = vec![0usize; ingredient_costs.len()];
        let mut choice: Vec<&BrandCost> = Vec::with_capacity(indices.len());
        'combinations: loop {
            choice.clear();
            choice.extend(
                ingredient_costs
                    .iter()
                    .zip(&indices)
                    .map(|(ic, &i)| &ic.brand_options[i]),
            );
            recipe_costs.push(price_combination(&choice, &pricing));

            let mut slot = indices.len();
            loop {
                if slot == 0 {
                    break 'combinations;
                }
                slot -= 1;
                indices[slot] += 1;
                if indices[slot] < ingredient_costs[slot].brand_options.len() {
                    break;
                }
                indices[slot] = 0;
            }
        }
    }

    // Stable: equal totals keep enumeration order
    recipe_costs.sort_by(|a, b| a.total_cost.total_cmp(&b.total_cost));

    tracing::debug!(
        slots = slots.len(),
        combinations = recipe_costs.len(),
        "Calculated recipe cost combinations"
    );

    Ok(Combinations {
        recipe_costs,
        ingredient_costs,
    })
}
