//! Ad-hoc cost calculation over hand-picked brands.

use axum::{extract::State, Json};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::validate_amount;
use crate::db::{Ingredient, User};
use crate::engine::cost_calculator::{Brand, Slot};
use crate::engine::units::{parse_amount, Amount};
use crate::engine::{calculate, Combinations, Pricing};
use crate::AppState;

/// Either `{"unit": "oz", "quantity": 1.5}` or a written amount like "1.5oz"
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Measured(Amount),
    Written(String),
}

impl AmountInput {
    fn resolve(&self) -> Result<Amount, String> {
        let amount = match self {
            AmountInput::Measured(amount) => *amount,
            AmountInput::Written(text) => {
                parse_amount(text).ok_or_else(|| format!("Unrecognized amount \"{}\"", text))?
            }
        };
        validate_amount(&amount)?;
        Ok(amount)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotRequest {
    #[serde(default)]
    pub label: String,
    pub amount: AmountInput,
    /// Ingredient source ids acceptable for this slot
    #[serde(default)]
    pub brands: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalculatorRequest {
    pub menu_price: f64,
    #[serde(default)]
    pub desired_margin: Option<f64>,
    #[serde(default)]
    pub slots: Vec<SlotRequest>,
}

/// Brands the user may pick from, keyed by source id
async fn visible_brands(state: &AppState, user: &User) -> Result<HashMap<String, Brand>, ApiError> {
    let ingredients = Ingredient::list_details(&state.db, &user.id, None).await?;
    Ok(ingredients
        .iter()
        .flat_map(|i| i.to_brands())
        .map(|b| (b.id.clone(), b))
        .collect())
}

/// POST /api/calculator
pub async fn calculate_costs(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CalculatorRequest>,
) -> Result<Json<Combinations>, ApiError> {
    let mut builder = ValidationErrorBuilder::new();
    let mut amounts = Vec::with_capacity(req.slots.len());
    for (i, slot) in req.slots.iter().enumerate() {
        match slot.amount.resolve() {
            Ok(amount) => amounts.push(amount),
            Err(e) => {
                builder.add(format!("slots[{}].amount", i), e);
            }
        }
    }
    builder.finish()?;

    let brands = visible_brands(&state, &user).await?;

    let mut catalog: Vec<Brand> = Vec::new();
    let slots: Vec<Slot> = req
        .slots
        .iter()
        .zip(amounts)
        .enumerate()
        .map(|(i, (slot, amount))| {
            // Unknown or hidden brand ids are dropped from the slot
            for id in &slot.brands {
                if let Some(brand) = brands.get(id) {
                    if !catalog.iter().any(|b| &b.id == id) {
                        catalog.push(brand.clone());
                    }
                }
            }
            Slot {
                label: if slot.label.trim().is_empty() {
                    format!("Ingredient {}", i + 1)
                } else {
                    slot.label.trim().to_string()
                },
                amount,
                brands: slot.brands.clone(),
            }
        })
        .collect();

    let mut pricing = Pricing::new(req.menu_price);
    if let Some(margin) = req.desired_margin {
        pricing = pricing.with_desired_margin(margin);
    }

    Ok(Json(calculate(&slots, &catalog, pricing)?))
}
