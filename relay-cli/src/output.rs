use colored::*;

use crate::commands::Outcome;

pub(crate) fn render(outcome: &Outcome) {
    match outcome {
        Outcome::Reply { peer, body } => {
            println!("{} {}", format!("✔ {peer}:").green().bold(), body);
        }
        Outcome::Messages { queue, messages } => {
            println!(
                "{} {}",
                format!("{queue}").bold(),
                format!("({} entries)", messages.len()).dimmed()
            );
            for (position, message) in messages.iter().enumerate() {
                println!("  {:>3}  {}", position + 1, message);
            }
        }
        Outcome::Products(products) => {
            if products.is_empty() {
                println!("{}", "No products".dimmed());
            }
            for product in products {
                println!(
                    "  {:>4}  {}  {}",
                    product.id.to_string().bold(),
                    product.name,
                    format!("♥ {}", product.like_count).magenta()
                );
            }
        }
    }
}
