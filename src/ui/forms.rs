//! Decoding of dashboard HTML forms.
//!
//! Recipe and menu forms repeat their row fields (`ingredient_id`,
//! `quantity`, `unit`, ...), so they arrive as ordered key/value pairs and
//! are zipped back into rows here.

use serde::Deserialize;

use crate::db::{
    CreateIngredientRequest, MenuEntryInput, MenuInput, MenuPlacement, RecipeIngredientInput,
    RecipeInput, SizeInput, SourceInput,
};
use crate::engine::units::{parse_size_ml, Amount, Unit};

#[derive(Debug, Deserialize)]
pub struct CustomIngredientForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub alcohol_type: String,
    #[serde(default)]
    pub proof: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub price: String,
}

/// Values of every occurrence of `key`, in submission order
fn values<'a>(pairs: &'a [(String, String)], key: &str) -> Vec<&'a str> {
    pairs
        .iter()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v.trim())
        .collect()
}

/// First value of `key`, trimmed
pub fn value<'a>(pairs: &'a [(String, String)], key: &str) -> &'a str {
    values(pairs, key).first().copied().unwrap_or_default()
}

/// Repeated fields zipped into rows, padded with empty strings. Used to
/// refill a form that failed to parse.
pub fn rows<'a>(pairs: &'a [(String, String)], keys: &[&str]) -> Vec<Vec<&'a str>> {
    let columns: Vec<Vec<&str>> = keys.iter().map(|k| values(pairs, k)).collect();
    let len = columns.iter().map(|c| c.len()).max().unwrap_or(0);
    (0..len)
        .map(|i| {
            columns
                .iter()
                .map(|c| c.get(i).copied().unwrap_or_default())
                .collect()
        })
        .collect()
}

fn parse_positive(text: &str, message: &str) -> Result<f64, String> {
    let text = text.trim_start_matches('$');
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(message.to_string()),
    }
}

/// Recipe form: name, repeated ingredient rows and, when creating, repeated
/// menu placement rows. Rows without an ingredient or menu are ignored.
pub fn parse_recipe_form(pairs: &[(String, String)]) -> Result<(RecipeInput, Vec<MenuPlacement>), String> {
    let ingredient_ids = values(pairs, "ingredient_id");
    let quantities = values(pairs, "quantity");
    let units = values(pairs, "unit");

    let mut ingredients = Vec::new();
    for (i, ingredient_id) in ingredient_ids.iter().enumerate() {
        if ingredient_id.is_empty() {
            continue;
        }
        let quantity = parse_positive(
            quantities.get(i).copied().unwrap_or_default(),
            "Each ingredient needs an amount greater than zero",
        )?;
        let unit = units
            .get(i)
            .and_then(|u| Unit::from_str(u))
            .unwrap_or(Unit::Oz);
        ingredients.push(RecipeIngredientInput {
            ingredient_id: ingredient_id.to_string(),
            amount: Amount::new(unit, quantity),
        });
    }

    let menu_ids = values(pairs, "menu_id");
    let menu_names = values(pairs, "menu_name");
    let menu_prices = values(pairs, "menu_price");

    let mut placements = Vec::new();
    for i in 0..menu_ids.len().max(menu_names.len()) {
        let menu_id = menu_ids.get(i).copied().unwrap_or_default();
        let menu_name = menu_names.get(i).copied().unwrap_or_default();
        if menu_id.is_empty() && menu_name.is_empty() {
            continue;
        }
        let price = parse_positive(
            menu_prices.get(i).copied().unwrap_or_default(),
            "Each menu needs a price greater than zero",
        )?;
        placements.push(MenuPlacement {
            menu_id: (!menu_id.is_empty()).then(|| menu_id.to_string()),
            // Existing menus keep their own name
            name: if menu_name.is_empty() {
                menu_id.to_string()
            } else {
                menu_name.to_string()
            },
            price,
        });
    }

    let recipe = RecipeInput {
        name: value(pairs, "name").to_string(),
        ingredients,
    };
    Ok((recipe, placements))
}

/// Menu form: name and repeated `recipe_id`/`price` rows
pub fn parse_menu_form(pairs: &[(String, String)]) -> Result<MenuInput, String> {
    let recipe_ids = values(pairs, "recipe_id");
    let prices = values(pairs, "price");

    let mut recipes = Vec::new();
    for (i, recipe_id) in recipe_ids.iter().enumerate() {
        if recipe_id.is_empty() {
            continue;
        }
        let price = parse_positive(
            prices.get(i).copied().unwrap_or_default(),
            "Each recipe needs a price greater than zero",
        )?;
        recipes.push(MenuEntryInput {
            recipe_id: recipe_id.to_string(),
            price,
        });
    }

    Ok(MenuInput {
        name: value(pairs, "name").to_string(),
        recipes,
    })
}

/// Custom ingredient form with an optional single priced size
pub fn parse_custom_ingredient(form: &CustomIngredientForm) -> Result<CreateIngredientRequest, String> {
    let proof = match form.proof.trim() {
        "" => None,
        p => Some(p.parse::<f64>().map_err(|_| "Proof must be a number".to_string())?),
    };

    let size = form.size.trim();
    let price = form.price.trim();
    let sources = if size.is_empty() && price.is_empty() {
        None
    } else {
        let quantity_ml = parse_size_ml(size).ok_or_else(|| format!("Unrecognized size \"{}\"", size))?;
        let price = parse_positive(price, "Price must be greater than zero")?;
        let source = match form.source.trim() {
            "" => crate::db::CUSTOM_SOURCE.to_string(),
            s => s.to_string(),
        };
        Some(vec![SourceInput {
            name: source,
            sizes: vec![SizeInput {
                label: Some(size.to_string()),
                unit: Unit::Ml,
                quantity: quantity_ml,
                price,
                regular_price: None,
                discount: None,
            }],
        }])
    };

    Ok(CreateIngredientRequest {
        name: form.name.trim().to_string(),
        alcohol_type: Some(form.alcohol_type.trim())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_string()),
        proof,
        sources,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_recipe_form_rows() {
        let form = pairs(&[
            ("name", " Negroni "),
            ("ingredient_id", "gin"),
            ("quantity", "1"),
            ("unit", "oz"),
            ("ingredient_id", ""),
            ("quantity", ""),
            ("unit", "oz"),
            ("ingredient_id", "campari"),
            ("quantity", "30"),
            ("unit", "ml"),
        ]);
        let (recipe, placements) = parse_recipe_form(&form).unwrap();
        assert_eq!(recipe.name, "Negroni");
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.ingredients[0].ingredient_id, "gin");
        assert_eq!(recipe.ingredients[0].amount, Amount::oz(1.0));
        assert_eq!(recipe.ingredients[1].amount, Amount::new(Unit::Ml, 30.0));
        assert!(placements.is_empty());
    }

    #[test]
    fn test_parse_recipe_form_rejects_missing_amount() {
        let form = pairs(&[("name", "Bad"), ("ingredient_id", "gin"), ("quantity", "0"), ("unit", "oz")]);
        assert!(parse_recipe_form(&form).is_err());
    }

    #[test]
    fn test_parse_recipe_form_menu_placements() {
        let form = pairs(&[
            ("name", "Spritz"),
            ("menu_id", "menu-1"),
            ("menu_name", ""),
            ("menu_price", "$12"),
            ("menu_id", ""),
            ("menu_name", "Patio"),
            ("menu_price", "11.5"),
            ("menu_id", ""),
            ("menu_name", ""),
            ("menu_price", ""),
        ]);
        let (_, placements) = parse_recipe_form(&form).unwrap();
        assert_eq!(placements.len(), 2);
        assert_eq!(placements[0].menu_id.as_deref(), Some("menu-1"));
        assert_eq!(placements[0].price, 12.0);
        assert_eq!(placements[1].menu_id, None);
        assert_eq!(placements[1].name, "Patio");
    }

    #[test]
    fn test_rows_pads_short_columns() {
        let form = pairs(&[
            ("recipe_id", "r1"),
            ("price", "9"),
            ("recipe_id", "r2"),
        ]);
        let table = rows(&form, &["recipe_id", "price"]);
        assert_eq!(table, vec![vec!["r1", "9"], vec!["r2", ""]]);
    }

    #[test]
    fn test_parse_menu_form() {
        let form = pairs(&[
            ("name", "Brunch"),
            ("recipe_id", "r1"),
            ("price", "9"),
            ("recipe_id", ""),
            ("price", ""),
        ]);
        let menu = parse_menu_form(&form).unwrap();
        assert_eq!(menu.name, "Brunch");
        assert_eq!(menu.recipes.len(), 1);
        assert_eq!(menu.recipes[0].price, 9.0);

        let bad = pairs(&[("name", "Brunch"), ("recipe_id", "r1"), ("price", "free")]);
        assert!(parse_menu_form(&bad).is_err());
    }

    #[test]
    fn test_parse_custom_ingredient() {
        let form = CustomIngredientForm {
            name: " Orgeat ".to_string(),
            alcohol_type: String::new(),
            proof: String::new(),
            source: String::new(),
            size: "1L".to_string(),
            price: "14".to_string(),
        };
        let req = parse_custom_ingredient(&form).unwrap();
        assert_eq!(req.name, "Orgeat");
        assert_eq!(req.alcohol_type, None);
        let sources = req.sources.unwrap();
        assert_eq!(sources[0].name, "CUSTOM");
        assert_eq!(sources[0].sizes[0].quantity, 1000.0);

        let bare = CustomIngredientForm {
            name: "Bitters".to_string(),
            alcohol_type: "bitters".to_string(),
            proof: "90".to_string(),
            source: String::new(),
            size: String::new(),
            price: String::new(),
        };
        let req = parse_custom_ingredient(&bare).unwrap();
        assert!(req.sources.is_none());
        assert_eq!(req.proof, Some(90.0));

        let bad = CustomIngredientForm {
            size: "a jug".to_string(),
            price: "5".to_string(),
            ..bare
        };
        assert!(parse_custom_ingredient(&bad).is_err());
    }
}
