// Askama template definitions and the view models they render.
//
// Every page extends base.html, which shows the navigation whenever
// `user_name` is non-empty.

use askama::Template;

use crate::db::{IngredientResponse, IngredientSize, MenuResponse, RecipeResponse, User};
use crate::engine::Combinations;

/// Combinations listed on the recipe page before the rest are summarized
pub const MAX_LISTED_COMBINATIONS: usize = 50;

pub fn money(value: f64) -> String {
    format!("${:.2}", value)
}

pub fn percent(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Date part of a stored timestamp
fn day(timestamp: &str) -> String {
    timestamp.get(..10).unwrap_or(timestamp).to_string()
}

/// Quantities print without trailing zeros
fn quantity(value: f64) -> String {
    let text = format!("{:.2}", value);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[derive(Debug, Clone)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

// Ingredient list row
pub struct IngredientRow {
    pub id: String,
    pub name: String,
    pub category: String,
    pub proof: String,
    pub sources: String,
    pub best_size: String,
    pub best_price: String,
    pub unit_price: String,
    pub is_custom: bool,
}

impl From<&IngredientResponse> for IngredientRow {
    fn from(ingredient: &IngredientResponse) -> Self {
        let best = ingredient.best_value();
        Self {
            id: ingredient.id.clone(),
            name: ingredient.name.clone(),
            category: ingredient.alcohol_type.clone().unwrap_or_else(|| "-".to_string()),
            proof: ingredient.proof.map(quantity).unwrap_or_else(|| "-".to_string()),
            sources: ingredient
                .sources
                .iter()
                .map(|s| s.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            best_size: best.map(|s| s.label.clone()).unwrap_or_else(|| "-".to_string()),
            best_price: best.map(|s| money(s.price)).unwrap_or_else(|| "-".to_string()),
            unit_price: best
                .map(|s| format!("{}/oz", money(s.unit_price)))
                .unwrap_or_else(|| "-".to_string()),
            is_custom: ingredient.is_custom,
        }
    }
}

pub struct SizeView {
    pub label: String,
    pub price: String,
    pub regular_price: String,
    pub discount: String,
    pub unit_price: String,
    pub on_sale: bool,
}

impl From<&IngredientSize> for SizeView {
    fn from(size: &IngredientSize) -> Self {
        Self {
            label: size.label.clone(),
            price: money(size.price),
            regular_price: money(size.regular_price),
            discount: money(size.discount),
            unit_price: format!("{}/oz", money(size.unit_price)),
            on_sale: size.discount > 0.0,
        }
    }
}

pub struct SourceView {
    pub name: String,
    pub sizes: Vec<SizeView>,
}

/// One editable ingredient line of the recipe form
pub struct LineInput {
    pub ingredient_id: String,
    pub quantity: String,
    pub unit: String,
}

impl LineInput {
    pub fn blank() -> Self {
        Self {
            ingredient_id: String::new(),
            quantity: String::new(),
            unit: "oz".to_string(),
        }
    }

    pub fn from_recipe(recipe: &RecipeResponse) -> Vec<Self> {
        recipe
            .ingredients
            .iter()
            .map(|line| Self {
                ingredient_id: line.ingredient_id.clone(),
                quantity: quantity(line.amount.quantity),
                unit: line.amount.unit.as_str().to_string(),
            })
            .collect()
    }
}

/// One editable entry of the menu form
pub struct EntryInput {
    pub recipe_id: String,
    pub price: String,
}

impl EntryInput {
    pub fn blank() -> Self {
        Self {
            recipe_id: String::new(),
            price: String::new(),
        }
    }

    pub fn from_menu(menu: &MenuResponse) -> Vec<Self> {
        menu.recipes
            .iter()
            .map(|entry| Self {
                recipe_id: entry.recipe_id.clone(),
                price: format!("{:.2}", entry.price),
            })
            .collect()
    }
}

/// Menu to put a new recipe on
pub struct PlacementInput {
    pub menu_id: String,
    pub name: String,
    pub price: String,
}

impl PlacementInput {
    pub fn blank() -> Self {
        Self {
            menu_id: String::new(),
            name: String::new(),
            price: String::new(),
        }
    }
}

pub struct RecipeRow {
    pub id: String,
    pub name: String,
    pub summary: String,
    pub updated: String,
}

impl From<&RecipeResponse> for RecipeRow {
    fn from(recipe: &RecipeResponse) -> Self {
        Self {
            id: recipe.id.clone(),
            name: recipe.name.clone(),
            summary: recipe
                .ingredients
                .iter()
                .map(|line| format!("{} {}", line.amount, line.ingredient_name))
                .collect::<Vec<_>>()
                .join(", "),
            updated: day(&recipe.updated_at),
        }
    }
}

pub struct MenuRow {
    pub id: String,
    pub name: String,
    pub recipe_count: usize,
    pub revenue: String,
    pub updated: String,
}

impl From<&MenuResponse> for MenuRow {
    fn from(menu: &MenuResponse) -> Self {
        Self {
            id: menu.id.clone(),
            name: menu.name.clone(),
            recipe_count: menu.recipe_count,
            revenue: money(menu.revenue),
            updated: day(&menu.updated_at),
        }
    }
}

pub struct BreakdownItem {
    pub brand_name: String,
    pub size_used: String,
    pub cost: String,
}

pub struct CombinationRow {
    pub rank: usize,
    pub total_cost: String,
    pub profit: String,
    pub margin: String,
    pub suggested: String,
    pub unprofitable: bool,
    pub breakdown: Vec<BreakdownItem>,
}

pub struct BrandOptionView {
    pub brand_name: String,
    pub size_used: String,
    pub price_per_oz: String,
    pub total_cost: String,
}

pub struct SlotCostView {
    pub label: String,
    pub amount: String,
    pub options: Vec<BrandOptionView>,
}

/// Cost calculator output prepared for the recipe page
pub struct CostAnalysis {
    pub menu_price: String,
    pub combination_count: usize,
    pub cheapest: String,
    pub most_expensive: String,
    pub rows: Vec<CombinationRow>,
    /// Combinations beyond the listed ones
    pub hidden: usize,
    pub slots: Vec<SlotCostView>,
}

impl CostAnalysis {
    pub fn new(combinations: &Combinations, menu_price: f64) -> Self {
        let costs = &combinations.recipe_costs;
        let rows = costs
            .iter()
            .take(MAX_LISTED_COMBINATIONS)
            .enumerate()
            .map(|(i, cost)| CombinationRow {
                rank: i + 1,
                total_cost: money(cost.total_cost),
                profit: money(cost.profit),
                margin: percent(cost.profit_margin),
                suggested: cost
                    .suggested_price
                    .as_ref()
                    .map(|s| money(s.price))
                    .unwrap_or_default(),
                unprofitable: cost.profit < 0.0,
                breakdown: cost
                    .breakdown
                    .iter()
                    .map(|b| BreakdownItem {
                        brand_name: b.brand_name.clone(),
                        size_used: b.size_used.clone(),
                        cost: money(b.cost),
                    })
                    .collect(),
            })
            .collect();

        let slots = combinations
            .ingredient_costs
            .iter()
            .map(|slot| SlotCostView {
                label: slot.label.clone(),
                amount: slot.amount.to_string(),
                options: slot
                    .brand_options
                    .iter()
                    .map(|o| BrandOptionView {
                        brand_name: o.brand_name.clone(),
                        size_used: o.size_used.clone(),
                        price_per_oz: money(o.price_per_oz),
                        total_cost: money(o.total_cost),
                    })
                    .collect(),
            })
            .collect();

        Self {
            menu_price: money(menu_price),
            combination_count: costs.len(),
            cheapest: costs.first().map(|c| money(c.total_cost)).unwrap_or_default(),
            most_expensive: costs.last().map(|c| money(c.total_cost)).unwrap_or_default(),
            rows,
            hidden: costs.len().saturating_sub(MAX_LISTED_COMBINATIONS),
            slots,
        }
    }
}

// Error page
#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub user_name: String,
    pub title: String,
    pub message: String,
}

// Login template
#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub user_name: String,
    pub error: Option<String>,
    pub email: String,
    pub version: String,
}

// Registration template
#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate {
    pub user_name: String,
    pub error: Option<String>,
    pub name: String,
    pub email: String,
}

// Dashboard template
#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub user_name: String,
    pub ingredient_count: usize,
    pub custom_count: usize,
    pub recipe_count: usize,
    pub menu_count: usize,
    pub notice: Option<String>,
    pub error: Option<String>,
}

// Ingredient catalog template
#[derive(Template)]
#[template(path = "ingredients.html")]
pub struct IngredientsTemplate {
    pub user_name: String,
    pub q: String,
    pub sort: String,
    pub desc: bool,
    pub sort_options: Vec<SelectOption>,
    pub ingredients: Vec<IngredientRow>,
    pub error: Option<String>,
}

// Ingredient detail template
#[derive(Template)]
#[template(path = "ingredient_detail.html")]
pub struct IngredientDetailTemplate {
    pub user_name: String,
    pub ingredient: IngredientRow,
    pub sources: Vec<SourceView>,
}

// Recipe list template
#[derive(Template)]
#[template(path = "recipes.html")]
pub struct RecipesTemplate {
    pub user_name: String,
    pub recipes: Vec<RecipeRow>,
}

// New/edit recipe form template
#[derive(Template)]
#[template(path = "recipe_form.html")]
pub struct RecipeFormTemplate {
    pub user_name: String,
    pub title: String,
    pub action: String,
    pub name: String,
    pub lines: Vec<LineInput>,
    pub ingredient_options: Vec<SelectOption>,
    pub units: Vec<SelectOption>,
    /// Menu placement rows are only offered when creating
    pub placements: Vec<PlacementInput>,
    pub menu_options: Vec<SelectOption>,
    pub error: Option<String>,
}

pub struct LineView {
    pub ingredient_id: String,
    pub ingredient_name: String,
    pub amount: String,
}

// Recipe detail and cost analysis template
#[derive(Template)]
#[template(path = "recipe_detail.html")]
pub struct RecipeDetailTemplate {
    pub user_name: String,
    pub id: String,
    pub name: String,
    pub lines: Vec<LineView>,
    pub menu_price: String,
    pub desired_margin: String,
    pub analysis: Option<CostAnalysis>,
    pub cost_error: Option<String>,
}

// Menu list template
#[derive(Template)]
#[template(path = "menus.html")]
pub struct MenusTemplate {
    pub user_name: String,
    pub menus: Vec<MenuRow>,
}

// New menu form and menu detail template
#[derive(Template)]
#[template(path = "menu_form.html")]
pub struct MenuFormTemplate {
    pub user_name: String,
    pub title: String,
    pub action: String,
    /// Set when editing an existing menu
    pub menu_id: Option<String>,
    pub name: String,
    pub entries: Vec<EntryInput>,
    pub recipe_options: Vec<SelectOption>,
    pub revenue: String,
    pub recipe_count: usize,
    pub error: Option<String>,
}

// Profile template
#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub user_name: String,
    pub email: String,
    pub member_since: String,
    pub recipe_count: usize,
    pub menu_count: usize,
    pub custom_count: usize,
}

impl ProfileTemplate {
    pub fn new(user: &User, recipe_count: usize, menu_count: usize, custom_count: usize) -> Self {
        Self {
            user_name: user.name.clone(),
            email: user.email.clone(),
            member_since: day(&user.created_at),
            recipe_count,
            menu_count,
            custom_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cost_calculator::{Brand, PackageSize, Slot};
    use crate::engine::units::Amount;
    use crate::engine::{calculate, Pricing};

    #[test]
    fn test_formatting_helpers() {
        assert_eq!(money(12.0), "$12.00");
        assert_eq!(money(0.456), "$0.46");
        assert_eq!(percent(66.666), "66.7%");
        assert_eq!(quantity(1.5), "1.5");
        assert_eq!(quantity(2.0), "2");
        assert_eq!(quantity(0.75), "0.75");
        assert_eq!(day("2026-03-01T10:00:00.000000Z"), "2026-03-01");
        assert_eq!(day("short"), "short");
    }

    fn brand(id: &str, price: f64) -> Brand {
        Brand {
            id: id.to_string(),
            name: format!("Brand {}", id),
            sizes: vec![PackageSize {
                size: "750ml".to_string(),
                sale_price: price,
            }],
        }
    }

    #[test]
    fn test_cost_analysis_view() {
        let slots = vec![Slot {
            label: "Gin".to_string(),
            amount: Amount::oz(2.0),
            brands: vec!["a".to_string(), "b".to_string()],
        }];
        let catalog = vec![brand("a", 25.0), brand("b", 50.0)];
        let combinations = calculate(&slots, &catalog, Pricing::new(3.0)).unwrap();

        let view = CostAnalysis::new(&combinations, 3.0);
        assert_eq!(view.combination_count, 2);
        assert_eq!(view.menu_price, "$3.00");
        assert_eq!(view.rows[0].rank, 1);
        assert_eq!(view.rows[0].breakdown[0].brand_name, "Brand a");
        assert_eq!(view.cheapest, view.rows[0].total_cost);
        assert_eq!(view.most_expensive, view.rows[1].total_cost);
        // Brand b costs about $3.94 for 2oz, more than the menu price
        assert!(view.rows[1].unprofitable);
        assert_eq!(view.hidden, 0);
        assert_eq!(view.slots[0].options.len(), 2);
        assert_eq!(view.slots[0].amount, "2oz");
    }

    #[test]
    fn test_cost_analysis_caps_listed_rows() {
        let brands: Vec<Brand> = (0..8).map(|i| brand(&i.to_string(), 20.0 + i as f64)).collect();
        let ids: Vec<String> = brands.iter().map(|b| b.id.clone()).collect();
        let slots: Vec<Slot> = (0..2)
            .map(|i| Slot {
                label: format!("Slot {}", i),
                amount: Amount::oz(1.0),
                brands: ids.clone(),
            })
            .collect();
        let combinations = calculate(&slots, &brands, Pricing::new(10.0)).unwrap();

        let view = CostAnalysis::new(&combinations, 10.0);
        assert_eq!(view.combination_count, 64);
        assert_eq!(view.rows.len(), MAX_LISTED_COMBINATIONS);
        assert_eq!(view.hidden, 14);
    }
}
