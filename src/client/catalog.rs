//! Catalog helpers
//!
//! Pure functions over fetched product lists. [`crate::client::SellerClient`]
//! wraps them with a fetch, but they are usable on any slice of products.

use super::types::{Balance, Package, Product};

/// Currency symbol of the vendor account (Thai baht)
pub const DEFAULT_CURRENCY: &str = "฿";

/// Products whose `isActive` flag is true, in input order
pub fn active_products(products: &[Product]) -> Vec<Product> {
    products.iter().filter(|p| p.is_active).cloned().collect()
}

/// First product whose name contains `needle`, ignoring case.
///
/// An empty needle matches nothing.
pub fn find_product_by_name<'a>(products: &'a [Product], needle: &str) -> Option<&'a Product> {
    if needle.is_empty() {
        return None;
    }
    let needle = needle.to_lowercase();
    products
        .iter()
        .find(|p| p.name.to_lowercase().contains(&needle))
}

/// Product with exactly this id
pub fn find_product_by_id<'a>(products: &'a [Product], id: &str) -> Option<&'a Product> {
    products.iter().find(|p| p.id == id)
}

/// Packages of `product` whose `isActive` flag is true
pub fn active_packages(product: &Product) -> Vec<Package> {
    product.packages.iter().filter(|p| p.is_active).cloned().collect()
}

/// First package of `product` whose name contains `needle`, ignoring case
pub fn find_package_by_name<'a>(product: &'a Product, needle: &str) -> Option<&'a Package> {
    if needle.is_empty() {
        return None;
    }
    let needle = needle.to_lowercase();
    product
        .packages
        .iter()
        .find(|p| p.name.to_lowercase().contains(&needle))
}

/// Package of `product` with exactly this id
pub fn find_package_by_id<'a>(product: &'a Product, id: &str) -> Option<&'a Package> {
    product.packages.iter().find(|p| p.id == id)
}

/// Balance amount, `0.0` when the account reports none
pub fn balance_amount(balance: Option<&Balance>) -> f64 {
    balance.map(|b| b.balance).unwrap_or(0.0)
}

/// Whether `balance` covers `required`
pub fn has_enough_balance(balance: f64, required: f64) -> bool {
    balance >= required
}

/// Format an amount with two decimals, thousands separators and a currency suffix.
///
/// `format_price(1234.5, "฿")` yields `"1,234.50 ฿"`.
pub fn format_price(amount: f64, currency: &str) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    // "-0.00" is printed as "0.00"
    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}{}.{} {}", sign, grouped, frac_part, currency)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn catalog() -> Vec<Product> {
        serde_json::from_value(json!([
            {"id": "1", "name": "Free Fire", "isActive": true},
            {"id": "2", "name": "ROV", "isActive": false},
            {"id": "3", "name": "Genshin Impact", "isActive": true}
        ]))
        .unwrap()
    }

    #[test]
    fn test_active_products_keeps_order() {
        let active = active_products(&catalog());
        let ids: Vec<_> = active.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn test_active_products_numeric_ids() {
        let products: Vec<Product> = serde_json::from_value(json!([
            {"id": 1, "isActive": true},
            {"id": 2, "isActive": false}
        ]))
        .unwrap();
        let active = active_products(&products);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "1");
    }

    #[test]
    fn test_find_by_name_case_insensitive_substring() {
        let products = catalog();
        assert_eq!(find_product_by_name(&products, "fire").unwrap().id, "1");
        assert_eq!(find_product_by_name(&products, "GENSHIN").unwrap().id, "3");
        assert!(find_product_by_name(&products, "Valorant").is_none());
        assert!(find_product_by_name(&products, "").is_none());
    }

    #[test]
    fn test_find_by_id_exact() {
        let products = catalog();
        assert_eq!(find_product_by_id(&products, "2").unwrap().name, "ROV");
        assert!(find_product_by_id(&products, "20").is_none());
    }

    #[test]
    fn test_package_helpers() {
        let product: Product = serde_json::from_value(json!({
            "id": 7,
            "name": "Free Fire",
            "isActive": true,
            "packages": [
                {"id": "p1", "name": "100 Diamonds", "price": 35, "isActive": true},
                {"id": "p2", "name": "310 Diamonds", "price": "99.00", "isActive": false},
                {"id": "p3", "name": "Weekly Membership", "price": 59, "isActive": true}
            ]
        }))
        .unwrap();

        let active: Vec<_> = active_packages(&product).into_iter().map(|p| p.id).collect();
        assert_eq!(active, vec!["p1", "p3"]);
        assert_eq!(find_package_by_name(&product, "diamonds").unwrap().id, "p1");
        assert_eq!(find_package_by_name(&product, "weekly").unwrap().price, 59.0);
        assert_eq!(find_package_by_id(&product, "p2").unwrap().price, 99.0);
        assert!(find_package_by_id(&product, "P2").is_none());
    }

    #[test]
    fn test_balance_helpers() {
        assert_eq!(balance_amount(None), 0.0);
        assert_eq!(balance_amount(Some(&Balance { balance: 42.5 })), 42.5);
        assert!(has_enough_balance(100.0, 100.0));
        assert!(!has_enough_balance(99.99, 100.0));
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(1234.5, DEFAULT_CURRENCY), "1,234.50 ฿");
        assert_eq!(format_price(0.0, "฿"), "0.00 ฿");
        assert_eq!(format_price(999.999, "฿"), "1,000.00 ฿");
        assert_eq!(format_price(1234567.0, "THB"), "1,234,567.00 THB");
        assert_eq!(format_price(-50.0, "฿"), "-50.00 ฿");
    }
}
