//! Tag statistics and rankings for charts.

use crate::{
    core::{
        money::{round_cents, sum_money, to_money},
        tags::{TagTree, load_tag_tree},
    },
    entities::{
        BankSubtransaction, BankTagLink, BankTagLinkColumn, BankTransaction, CreditSubtransaction,
        CreditTagLink, CreditTagLinkColumn, CreditTransaction,
    },
    errors::{Error, Result},
};
use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use sea_orm::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument};

/// One tagged line item as seen by the statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaggedAmount {
    /// Bank subtotals are negative for money spent
    Bank { date: NaiveDate, subtotal: Decimal },
    /// Credit subtotals are positive for money spent
    Credit { date: NaiveDate, subtotal: Decimal },
}

impl TaggedAmount {
    fn date(&self) -> NaiveDate {
        match self {
            Self::Bank { date, .. } | Self::Credit { date, .. } => *date,
        }
    }

    /// Amount spent, positive for outflows on either side.
    #[must_use]
    pub fn expenditure(&self) -> Decimal {
        match self {
            Self::Bank { subtotal, .. } => -*subtotal,
            Self::Credit { subtotal, .. } => *subtotal,
        }
    }
}

/// Totals for a tag and everything beneath it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagStatistics {
    pub bank_total: Decimal,
    pub credit_total: Decimal,
    pub subtransaction_count: usize,
    /// Expenditure keyed by the first day of each month
    pub monthly_expenditure: BTreeMap<NaiveDate, Decimal>,
}

impl TagStatistics {
    /// Builds statistics from line items that were already deduplicated.
    #[must_use]
    pub fn from_amounts(amounts: &[TaggedAmount]) -> Self {
        let mut monthly: BTreeMap<NaiveDate, Vec<Decimal>> = BTreeMap::new();
        for amount in amounts {
            monthly
                .entry(month_start(amount.date()))
                .or_default()
                .push(amount.expenditure());
        }

        Self {
            bank_total: sum_money(amounts.iter().filter_map(|amount| match amount {
                TaggedAmount::Bank { subtotal, .. } => Some(*subtotal),
                TaggedAmount::Credit { .. } => None,
            })),
            credit_total: sum_money(amounts.iter().filter_map(|amount| match amount {
                TaggedAmount::Credit { subtotal, .. } => Some(*subtotal),
                TaggedAmount::Bank { .. } => None,
            })),
            subtransaction_count: amounts.len(),
            monthly_expenditure: monthly
                .into_iter()
                .map(|(month, values)| (month, sum_money(values)))
                .collect(),
        }
    }

    /// Expenditure over months whose first day falls within `[start, end]`.
    #[must_use]
    pub fn interval_total(&self, start: NaiveDate, end: NaiveDate) -> Decimal {
        sum_money(
            self.monthly_expenditure
                .range(start..=end)
                .map(|(_, amount)| *amount),
        )
    }
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Statistics for a tag, gathering every subtransaction linked to it or a descendant.
#[instrument(skip(db))]
pub async fn tag_statistics(
    db: &DatabaseConnection,
    user_id: i64,
    tag_id: i64,
) -> Result<TagStatistics> {
    let tree = load_tag_tree(db, user_id).await?;
    statistics_in_tree(db, &tree, tag_id).await
}

async fn statistics_in_tree(
    db: &DatabaseConnection,
    tree: &TagTree,
    tag_id: i64,
) -> Result<TagStatistics> {
    if !tree.contains(tag_id) {
        return Err(Error::NotFound {
            entity: "tag",
            id: tag_id,
        });
    }
    let mut tag_ids = tree.descendants(tag_id);
    tag_ids.push(tag_id);

    // A line item linked to several tags of the subtree is counted once
    let bank_rows: BTreeMap<i64, (f64, NaiveDate)> = BankSubtransaction::find()
        .inner_join(BankTagLink)
        .filter(BankTagLinkColumn::TagId.is_in(tag_ids.iter().copied()))
        .find_also_related(BankTransaction)
        .all(db)
        .await?
        .into_iter()
        .filter_map(|(sub, transaction)| {
            transaction.map(|transaction| (sub.id, (sub.subtotal, transaction.transaction_date)))
        })
        .collect();
    let credit_rows: BTreeMap<i64, (f64, NaiveDate)> = CreditSubtransaction::find()
        .inner_join(CreditTagLink)
        .filter(CreditTagLinkColumn::TagId.is_in(tag_ids.iter().copied()))
        .find_also_related(CreditTransaction)
        .all(db)
        .await?
        .into_iter()
        .filter_map(|(sub, transaction)| {
            transaction.map(|transaction| (sub.id, (sub.subtotal, transaction.transaction_date)))
        })
        .collect();

    let amounts: Vec<TaggedAmount> = bank_rows
        .into_values()
        .map(|(subtotal, date)| TaggedAmount::Bank {
            date,
            subtotal: to_money(subtotal),
        })
        .chain(
            credit_rows
                .into_values()
                .map(|(subtotal, date)| TaggedAmount::Credit {
                    date,
                    subtotal: to_money(subtotal),
                }),
        )
        .collect();

    debug!(tag_id, count = amounts.len(), "Collected tagged subtransactions");
    Ok(TagStatistics::from_amounts(&amounts))
}

/// A tag's place in a ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedTag {
    pub tag_id: i64,
    pub tag_name: String,
    /// Expenditure over the year ending today
    pub past_year_total: Decimal,
    /// Monthly expenditure aligned with [`RankedTagStatistics::months`]
    pub series: Vec<Decimal>,
    pub statistics: TagStatistics,
}

/// Ranked tags with a shared, gap-free month axis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RankedTagStatistics {
    pub months: Vec<NaiveDate>,
    pub tags: Vec<RankedTag>,
}

/// Every month from the earliest to the latest month given, inclusive.
#[must_use]
pub fn month_range<'a, I>(months: I) -> Vec<NaiveDate>
where
    I: IntoIterator<Item = &'a NaiveDate>,
{
    let months: BTreeSet<NaiveDate> = months.into_iter().copied().map(month_start).collect();
    let (Some(first), Some(last)) = (months.first(), months.last()) else {
        return Vec::new();
    };

    let mut range = vec![*first];
    let mut current = *first;
    while let Some(next) = current.checked_add_months(Months::new(1)) {
        if next > *last {
            break;
        }
        range.push(next);
        current = next;
    }
    range
}

/// Ranks tags by expenditure over the past year and keeps the top `limit`.
///
/// Ties are broken by tag name, both descending. The month axis covers every month in
/// which a kept tag has non-zero expenditure.
#[instrument(skip(db, tag_ids))]
pub async fn ranked_tag_statistics(
    db: &DatabaseConnection,
    user_id: i64,
    tag_ids: &[i64],
    limit: usize,
    today: NaiveDate,
) -> Result<RankedTagStatistics> {
    if limit == 0 {
        return Err(Error::InvalidLimit { limit });
    }
    if tag_ids.is_empty() {
        return Ok(RankedTagStatistics::default());
    }

    let tree = load_tag_tree(db, user_id).await?;
    let year_ago = today
        .checked_sub_months(Months::new(12))
        .unwrap_or(NaiveDate::MIN);

    let mut ranked = Vec::with_capacity(tag_ids.len());
    for &tag_id in tag_ids {
        let statistics = statistics_in_tree(db, &tree, tag_id).await?;
        let tag_name = tree
            .get(tag_id)
            .map(|tag| tag.tag_name.clone())
            .unwrap_or_default();
        ranked.push(RankedTag {
            tag_id,
            past_year_total: statistics.interval_total(year_ago, today),
            tag_name,
            series: Vec::new(),
            statistics,
        });
    }
    ranked.sort_by(|a, b| {
        (b.past_year_total, &b.tag_name).cmp(&(a.past_year_total, &a.tag_name))
    });
    ranked.truncate(limit);

    let months = month_range(ranked.iter().flat_map(|tag| {
        tag.statistics
            .monthly_expenditure
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(month, _)| month)
    }));
    for tag in &mut ranked {
        tag.series = months
            .iter()
            .map(|month| {
                round_cents(
                    tag.statistics
                        .monthly_expenditure
                        .get(month)
                        .copied()
                        .unwrap_or_default(),
                )
            })
            .collect();
    }

    Ok(RankedTagStatistics {
        months,
        tags: ranked,
    })
}
