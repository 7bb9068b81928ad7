use serde::Serialize;
use sqlx::FromRow;

pub const EMPTY_MESSAGE: &str = "Ваш список покупок пуст.";
const HEADER: &str = "Ваш список покупок:";
const FOOTER: &str = "\nПриятного аппетита!";

pub const FILENAME: &str = "shopping_cart.txt";

/// One aggregated line of the shopping list.
#[derive(Debug, Clone, Serialize, FromRow, PartialEq, Eq)]
pub struct CartLine {
    pub name: String,
    pub unit: String,
    pub total_amount: i64,
}

/// Render aggregated cart lines as plain text, numbered in input order.
pub fn render(lines: &[CartLine]) -> String {
    if lines.is_empty() {
        return EMPTY_MESSAGE.to_string();
    }
    let mut out = Vec::with_capacity(lines.len() + 3);
    out.push(HEADER.to_string());
    out.push(String::new());
    for (i, line) in lines.iter().enumerate() {
        out.push(format!(
            "{}. {} ({}) — {}",
            i + 1,
            line.name,
            line.unit,
            line.total_amount
        ));
    }
    out.push(FOOTER.to_string());
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(name: &str, unit: &str, total: i64) -> CartLine {
        CartLine {
            name: name.into(),
            unit: unit.into(),
            total_amount: total,
        }
    }

    #[test]
    fn empty_cart_has_fixed_message() {
        assert_eq!(render(&[]), "Ваш список покупок пуст.");
    }

    #[test]
    fn single_line_matches_expected_text() {
        assert_eq!(
            render(&[line("salt", "g", 10)]),
            "Ваш список покупок:\n\n1. salt (g) — 10\n\nПриятного аппетита!"
        );
    }

    #[test]
    fn lines_are_numbered_in_input_order() {
        let text = render(&[line("water", "ml", 500), line("flour", "g", 200), line("egg", "pcs", 3)]);
        let body: Vec<&str> = text.lines().skip(2).take(3).collect();
        assert_eq!(
            body,
            vec!["1. water (ml) — 500", "2. flour (g) — 200", "3. egg (pcs) — 3"]
        );
        assert!(text.ends_with("\n\nПриятного аппетита!"));
    }
}
