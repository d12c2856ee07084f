use crate::models::CreditCard;

/// Narrow `cards` to those whose id contains `query`, ignoring case.
/// Relative order is preserved. An empty query keeps every card.
pub fn apply<'a, I>(cards: I, query: &str) -> Vec<&'a CreditCard>
where
    I: IntoIterator<Item = &'a CreditCard>,
{
    if query.is_empty() {
        return cards.into_iter().collect();
    }
    let needle = query.to_lowercase();
    cards
        .into_iter()
        .filter(|card| card.id.to_lowercase().contains(&needle))
        .collect()
}
