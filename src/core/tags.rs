//! Tag hierarchy business logic.
//!
//! Tags form a per-user tree through `parent_id`. [`TagTree`] holds one user's tags as an
//! id-indexed arena so that ancestor chains and descendant sets are plain traversals.
//!
//! Tagging a subtransaction with a tag also tags it with every ancestor of that tag, so a
//! line item tagged "Parking" is found under "Transportation" as well. The tree never
//! contains a cycle: [`set_tag_parent`] refuses to move a tag below itself or one of its
//! descendants.

use crate::{
    core::{
        bank::get_account_bank,
        credit::get_statement_bank,
        money::{sum_money, to_money},
        transaction::TransactionKind,
    },
    entities::{
        BankSubtransaction, BankTagLink, BankTagLinkColumn, BankTransaction, CreditSubtransaction,
        CreditSubtransactionColumn, CreditTagLink, CreditTagLinkColumn, CreditTransaction,
        CreditTransactionColumn, TransactionTag, TransactionTagColumn, bank_tag_link,
        credit_subtransaction, credit_tag_link, transaction_tag,
    },
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{
    JoinType, QueryOrder, QuerySelect, RelationTrait, Set,
    prelude::*,
    sea_query::{Func, OnConflict},
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, instrument};

/// One user's tags, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct TagTree {
    tags: BTreeMap<i64, transaction_tag::Model>,
    children: BTreeMap<i64, Vec<i64>>,
}

impl TagTree {
    /// Builds the arena from tag rows. Children are kept in name order.
    #[must_use]
    pub fn new(tags: Vec<transaction_tag::Model>) -> Self {
        let tags: BTreeMap<i64, transaction_tag::Model> =
            tags.into_iter().map(|tag| (tag.id, tag)).collect();

        let mut children: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        for tag in tags.values() {
            if let Some(parent_id) = tag.parent_id {
                children.entry(parent_id).or_default().push(tag.id);
            }
        }
        for ids in children.values_mut() {
            ids.sort_by_cached_key(|id| {
                tags.get(id)
                    .map(|tag| tag.tag_name.to_lowercase())
                    .unwrap_or_default()
            });
        }

        Self { tags, children }
    }

    /// Looks up a tag by id.
    #[must_use]
    pub fn get(&self, tag_id: i64) -> Option<&transaction_tag::Model> {
        self.tags.get(&tag_id)
    }

    /// Whether the tree holds this tag.
    #[must_use]
    pub fn contains(&self, tag_id: i64) -> bool {
        self.tags.contains_key(&tag_id)
    }

    /// Number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether the tree has no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Top-level tags, in name order.
    #[must_use]
    pub fn roots(&self) -> Vec<i64> {
        let mut roots: Vec<&transaction_tag::Model> = self
            .tags
            .values()
            .filter(|tag| tag.parent_id.is_none_or(|parent_id| !self.contains(parent_id)))
            .collect();
        roots.sort_by_cached_key(|tag| tag.tag_name.to_lowercase());
        roots.into_iter().map(|tag| tag.id).collect()
    }

    /// Direct children of a tag, in name order.
    #[must_use]
    pub fn children(&self, tag_id: i64) -> &[i64] {
        self.children.get(&tag_id).map_or(&[], Vec::as_slice)
    }

    /// Ancestors of a tag, nearest first. Empty for a root or an unknown tag.
    #[must_use]
    pub fn ancestors(&self, tag_id: i64) -> Vec<i64> {
        let mut ancestors = Vec::new();
        let mut seen = BTreeSet::from([tag_id]);
        let mut current = self.get(tag_id).and_then(|tag| tag.parent_id);

        while let Some(parent_id) = current {
            // Stop on a corrupted loop rather than walking forever
            if !seen.insert(parent_id) {
                break;
            }
            let Some(parent) = self.get(parent_id) else {
                break;
            };
            ancestors.push(parent_id);
            current = parent.parent_id;
        }
        ancestors
    }

    /// The tag followed by its ancestors up to the root.
    #[must_use]
    pub fn chain(&self, tag_id: i64) -> Vec<i64> {
        if !self.contains(tag_id) {
            return Vec::new();
        }
        std::iter::once(tag_id)
            .chain(self.ancestors(tag_id))
            .collect()
    }

    /// Every tag below this one (the tag itself excluded), breadth first.
    #[must_use]
    pub fn descendants(&self, tag_id: i64) -> Vec<i64> {
        let mut descendants = Vec::new();
        let mut seen = BTreeSet::from([tag_id]);
        let mut queue: VecDeque<i64> = self.children(tag_id).iter().copied().collect();

        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            descendants.push(id);
            queue.extend(self.children(id).iter().copied());
        }
        descendants
    }

    /// Number of ancestors; roots are at depth zero.
    #[must_use]
    pub fn depth(&self, tag_id: i64) -> usize {
        self.ancestors(tag_id).len()
    }

    /// Whether making `parent_id` the parent of `tag_id` would close a loop.
    #[must_use]
    pub fn would_create_cycle(&self, tag_id: i64, parent_id: i64) -> bool {
        parent_id == tag_id || self.ancestors(parent_id).contains(&tag_id)
    }

    /// Expands tag ids with all of their ancestors.
    ///
    /// # Errors
    /// Returns `NotFound` when an id is not one of this tree's tags.
    pub fn expand_with_ancestors(&self, tag_ids: &[i64]) -> Result<BTreeSet<i64>> {
        let mut expanded = BTreeSet::new();
        for &tag_id in tag_ids {
            if !self.contains(tag_id) {
                return Err(Error::NotFound {
                    entity: "tag",
                    id: tag_id,
                });
            }
            expanded.extend(self.chain(tag_id));
        }
        Ok(expanded)
    }
}

/// Loads every tag of a user into a [`TagTree`].
pub async fn load_tag_tree<C>(db: &C, user_id: i64) -> Result<TagTree>
where
    C: ConnectionTrait,
{
    let tags = TransactionTag::find()
        .filter(TransactionTagColumn::UserId.eq(user_id))
        .all(db)
        .await?;
    Ok(TagTree::new(tags))
}

fn validate_tag_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidName {
            message: "Tag name cannot be empty".to_string(),
        });
    }
    Ok(name.to_string())
}

async fn get_tag<C>(db: &C, tag_id: i64) -> Result<transaction_tag::Model>
where
    C: ConnectionTrait,
{
    TransactionTag::find_by_id(tag_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "tag",
            id: tag_id,
        })
}

/// Creates a tag, optionally below an existing tag of the same user.
///
/// Names are unique per user ignoring case; a duplicate is a `ConstraintViolation`.
#[instrument(skip(db))]
pub async fn create_tag<C>(
    db: &C,
    user_id: i64,
    name: &str,
    parent_id: Option<i64>,
) -> Result<transaction_tag::Model>
where
    C: ConnectionTrait,
{
    let name = validate_tag_name(name)?;

    if let Some(parent_id) = parent_id {
        let parent = get_tag(db, parent_id).await?;
        if parent.user_id != user_id {
            return Err(Error::NotFound {
                entity: "tag",
                id: parent_id,
            });
        }
    }

    let tag = transaction_tag::ActiveModel {
        user_id: Set(user_id),
        parent_id: Set(parent_id),
        tag_name: Set(name),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Error::from_write)?;

    debug!(tag_id = tag.id, "Created tag");
    Ok(tag)
}

/// Renames a tag.
pub async fn rename_tag(
    db: &DatabaseConnection,
    tag_id: i64,
    name: &str,
) -> Result<transaction_tag::Model> {
    let name = validate_tag_name(name)?;
    let tag = get_tag(db, tag_id).await?;

    let mut active: transaction_tag::ActiveModel = tag.into();
    active.tag_name = Set(name);
    active.update(db).await.map_err(Error::from_write)
}

/// Moves a tag below another tag, or to the top level when `parent_id` is `None`.
///
/// Existing links are left as they are; the statistics walk descendants, so totals under
/// the new parent include the moved subtree.
#[instrument(skip(db))]
pub async fn set_tag_parent(
    db: &DatabaseConnection,
    tag_id: i64,
    parent_id: Option<i64>,
) -> Result<transaction_tag::Model> {
    let tag = get_tag(db, tag_id).await?;

    if let Some(parent_id) = parent_id {
        let tree = load_tag_tree(db, tag.user_id).await?;
        if !tree.contains(parent_id) {
            return Err(Error::NotFound {
                entity: "tag",
                id: parent_id,
            });
        }
        if tree.would_create_cycle(tag_id, parent_id) {
            return Err(Error::TagCycle { tag_id, parent_id });
        }
    }

    let mut active: transaction_tag::ActiveModel = tag.into();
    active.parent_id = Set(parent_id);
    Ok(active.update(db).await?)
}

/// Deletes a tag together with its subtree and every link to them.
#[instrument(skip(db))]
pub async fn delete_tag(db: &DatabaseConnection, tag_id: i64) -> Result<()> {
    let result = TransactionTag::delete_by_id(tag_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::NotFound {
            entity: "tag",
            id: tag_id,
        });
    }
    Ok(())
}

/// Direct children of `parent_id` (top-level tags when `None`), in name order.
pub async fn get_subtags(
    db: &DatabaseConnection,
    user_id: i64,
    parent_id: Option<i64>,
) -> Result<Vec<transaction_tag::Model>> {
    let query = TransactionTag::find().filter(TransactionTagColumn::UserId.eq(user_id));
    let query = match parent_id {
        Some(parent_id) => query.filter(TransactionTagColumn::ParentId.eq(parent_id)),
        None => query.filter(TransactionTagColumn::ParentId.is_null()),
    };
    query
        .order_by_asc(TransactionTagColumn::TagName)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a user's tag by name, ignoring case.
pub async fn find_tag<C>(db: &C, user_id: i64, name: &str) -> Result<Option<transaction_tag::Model>>
where
    C: ConnectionTrait,
{
    TransactionTag::find()
        .filter(TransactionTagColumn::UserId.eq(user_id))
        .filter(
            Expr::expr(Func::lower(Expr::col(TransactionTagColumn::TagName)))
                .eq(name.trim().to_lowercase()),
        )
        .one(db)
        .await
        .map_err(Into::into)
}

/// A tag with its nested subtags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagNode {
    pub tag: transaction_tag::Model,
    pub children: Vec<TagNode>,
}

impl TagNode {
    fn build(tree: &TagTree, tag_id: i64, seen: &mut BTreeSet<i64>) -> Option<Self> {
        if !seen.insert(tag_id) {
            return None;
        }
        let tag = tree.get(tag_id)?.clone();
        let children = tree
            .children(tag_id)
            .iter()
            .filter_map(|&child_id| Self::build(tree, child_id, seen))
            .collect();
        Some(Self { tag, children })
    }
}

/// Returns the tag hierarchy below `root` (the whole forest when `None`).
pub async fn get_hierarchy(
    db: &DatabaseConnection,
    user_id: i64,
    root: Option<i64>,
) -> Result<Vec<TagNode>> {
    let tree = load_tag_tree(db, user_id).await?;
    let start = match root {
        Some(root) if !tree.contains(root) => {
            return Err(Error::NotFound {
                entity: "tag",
                id: root,
            });
        }
        Some(root) => tree.children(root).to_vec(),
        None => tree.roots(),
    };

    let mut seen = BTreeSet::new();
    Ok(start
        .into_iter()
        .filter_map(|tag_id| TagNode::build(&tree, tag_id, &mut seen))
        .collect())
}

/// Writes one link per tag, skipping links that already exist.
pub(crate) async fn insert_tag_links<C>(
    db: &C,
    kind: TransactionKind,
    subtransaction_id: i64,
    tag_ids: &BTreeSet<i64>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    if tag_ids.is_empty() {
        return Ok(());
    }

    match kind {
        TransactionKind::Bank => {
            let links = tag_ids.iter().map(|&tag_id| bank_tag_link::ActiveModel {
                subtransaction_id: Set(subtransaction_id),
                tag_id: Set(tag_id),
            });
            BankTagLink::insert_many(links)
                .on_conflict(
                    OnConflict::columns([
                        BankTagLinkColumn::SubtransactionId,
                        BankTagLinkColumn::TagId,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(db)
                .await
                .map_err(Error::from_write)?;
        }
        TransactionKind::Credit => {
            let links = tag_ids.iter().map(|&tag_id| credit_tag_link::ActiveModel {
                subtransaction_id: Set(subtransaction_id),
                tag_id: Set(tag_id),
            });
            CreditTagLink::insert_many(links)
                .on_conflict(
                    OnConflict::columns([
                        CreditTagLinkColumn::SubtransactionId,
                        CreditTagLinkColumn::TagId,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(db)
                .await
                .map_err(Error::from_write)?;
        }
    }
    Ok(())
}

/// The user owning a subtransaction, or `None` when it does not exist.
async fn subtransaction_user_id<C>(
    db: &C,
    kind: TransactionKind,
    subtransaction_id: i64,
) -> Result<Option<i64>>
where
    C: ConnectionTrait,
{
    let bank = match kind {
        TransactionKind::Bank => {
            let Some((_, Some(transaction))) = BankSubtransaction::find_by_id(subtransaction_id)
                .find_also_related(BankTransaction)
                .one(db)
                .await?
            else {
                return Ok(None);
            };
            get_account_bank(db, transaction.account_id).await?
        }
        TransactionKind::Credit => {
            let Some((_, Some(transaction))) = CreditSubtransaction::find_by_id(subtransaction_id)
                .find_also_related(CreditTransaction)
                .one(db)
                .await?
            else {
                return Ok(None);
            };
            get_statement_bank(db, transaction.statement_id).await?
        }
    };
    Ok(Some(bank.user_id))
}

/// Tags a subtransaction with each given tag and all of their ancestors.
///
/// The subtransaction must belong to `user_id`.
///
/// Returns the full set of tag ids the subtransaction is now linked to by this call.
#[instrument(skip(db))]
pub async fn link_tags_with_ancestors<C>(
    db: &C,
    user_id: i64,
    kind: TransactionKind,
    subtransaction_id: i64,
    tag_ids: &[i64],
) -> Result<BTreeSet<i64>>
where
    C: ConnectionTrait,
{
    if subtransaction_user_id(db, kind, subtransaction_id).await? != Some(user_id) {
        return Err(Error::NotFound {
            entity: "subtransaction",
            id: subtransaction_id,
        });
    }
    let tree = load_tag_tree(db, user_id).await?;
    let expanded = tree.expand_with_ancestors(tag_ids)?;
    insert_tag_links(db, kind, subtransaction_id, &expanded).await?;
    debug!(links = expanded.len(), "Linked tags");
    Ok(expanded)
}

/// Tags linked to a subtransaction, in name order.
pub async fn get_subtransaction_tags<C>(
    db: &C,
    kind: TransactionKind,
    subtransaction_id: i64,
) -> Result<Vec<transaction_tag::Model>>
where
    C: ConnectionTrait,
{
    let query = match kind {
        TransactionKind::Bank => TransactionTag::find()
            .inner_join(BankTagLink)
            .filter(BankTagLinkColumn::SubtransactionId.eq(subtransaction_id)),
        TransactionKind::Credit => TransactionTag::find()
            .inner_join(CreditTagLink)
            .filter(CreditTagLinkColumn::SubtransactionId.eq(subtransaction_id)),
    };
    query
        .order_by_asc(TransactionTagColumn::TagName)
        .all(db)
        .await
        .map_err(Into::into)
}

/// A subtransaction to be placed in a [`CategoryTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorizedItem {
    pub subtransaction_id: i64,
    pub subtotal: Decimal,
    pub tag_ids: Vec<i64>,
}

/// Subtransactions grouped by tag, nested the way the tags are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryTree {
    /// The category's tag; `None` at the root
    pub tag_id: Option<i64>,
    /// Items that belong here and in no subcategory
    pub items: Vec<(i64, Decimal)>,
    /// Subcategories keyed by tag name
    pub subcategories: BTreeMap<String, CategoryTree>,
}

impl CategoryTree {
    /// Total of this category's items and every subcategory.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        sum_money(
            self.items
                .iter()
                .map(|(_, subtotal)| *subtotal)
                .chain(self.subcategories.values().map(Self::subtotal)),
        )
    }

    /// Positive top-level categories as `(label, subtotal)`, largest first.
    ///
    /// Root-level items are reported under an empty label.
    #[must_use]
    pub fn chart_slices(&self, exclude: &[&str]) -> Vec<(String, Decimal)> {
        let mut slices: Vec<(String, Decimal)> = self
            .subcategories
            .iter()
            .filter(|(name, _)| !exclude.contains(&name.as_str()))
            .map(|(name, category)| (name.clone(), category.subtotal()))
            .filter(|(_, subtotal)| *subtotal > Decimal::ZERO)
            .collect();

        let other = sum_money(self.items.iter().map(|(_, subtotal)| *subtotal));
        if other > Decimal::ZERO {
            slices.push((String::new(), other));
        }
        slices.sort_by(|a, b| (b.1, &b.0).cmp(&(a.1, &a.0)));
        slices
    }
}

/// Orders an item's tags root first when they form one unbroken chain.
///
/// Tags spread across branches (or with gaps) cannot be placed below a single category.
fn category_path(tree: &TagTree, tag_ids: &[i64]) -> Option<Vec<i64>> {
    let unique: BTreeSet<i64> = tag_ids.iter().copied().collect();
    let mut path: Vec<i64> = unique.into_iter().collect();
    if path.iter().any(|&tag_id| !tree.contains(tag_id)) {
        return None;
    }
    path.sort_by_key(|&tag_id| tree.depth(tag_id));

    let connected = path.iter().enumerate().all(|(index, &tag_id)| {
        let parent_id = tree.get(tag_id).and_then(|tag| tag.parent_id);
        match index {
            0 => tree.depth(tag_id) == 0,
            _ => parent_id == Some(path[index - 1]),
        }
    });
    connected.then_some(path)
}

/// Places subtransactions into a category tree by their tags.
#[must_use]
pub fn categorize(tree: &TagTree, items: &[CategorizedItem]) -> CategoryTree {
    let mut root = CategoryTree::default();
    for item in items {
        let mut category = &mut root;
        for tag_id in category_path(tree, &item.tag_ids).unwrap_or_default() {
            let name = tree
                .get(tag_id)
                .map(|tag| tag.tag_name.clone())
                .unwrap_or_default();
            category = category
                .subcategories
                .entry(name)
                .or_insert_with(|| CategoryTree {
                    tag_id: Some(tag_id),
                    ..CategoryTree::default()
                });
        }
        category.items.push((item.subtransaction_id, item.subtotal));
    }
    root
}

/// Categorizes every credit subtransaction of a statement.
pub async fn categorize_statement(
    db: &DatabaseConnection,
    user_id: i64,
    statement_id: i64,
) -> Result<CategoryTree> {
    let tree = load_tag_tree(db, user_id).await?;

    let subtransactions = CreditSubtransaction::find()
        .inner_join(CreditTransaction)
        .filter(CreditTransactionColumn::StatementId.eq(statement_id))
        .order_by_asc(CreditSubtransactionColumn::Id)
        .all(db)
        .await?;

    let mut links: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    for link in CreditTagLink::find()
        .inner_join(CreditSubtransaction)
        .join(JoinType::InnerJoin, credit_subtransaction::Relation::Transaction.def())
        .filter(CreditTransactionColumn::StatementId.eq(statement_id))
        .all(db)
        .await?
    {
        links.entry(link.subtransaction_id).or_default().push(link.tag_id);
    }

    let items: Vec<CategorizedItem> = subtransactions
        .iter()
        .map(|sub| CategorizedItem {
            subtransaction_id: sub.id,
            subtotal: to_money(sub.subtotal),
            tag_ids: links.remove(&sub.id).unwrap_or_default(),
        })
        .collect();
    Ok(categorize(&tree, &items))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use rust_decimal_macros::dec;

    fn tag(id: i64, parent_id: Option<i64>, name: &str) -> transaction_tag::Model {
        transaction_tag::Model {
            id,
            user_id: 1,
            parent_id,
            tag_name: name.to_string(),
        }
    }

    fn sample_tree() -> TagTree {
        // Transportation(1) > Parking(2), Gas(3); Parking > Meters(4); Food(5)
        TagTree::new(vec![
            tag(1, None, "Transportation"),
            tag(2, Some(1), "Parking"),
            tag(3, Some(1), "Gas"),
            tag(4, Some(2), "Meters"),
            tag(5, None, "Food"),
        ])
    }

    #[test]
    fn test_tree_walks() {
        let tree = sample_tree();
        assert_eq!(tree.roots(), vec![5, 1]);
        assert_eq!(tree.children(1), &[3, 2]);
        assert_eq!(tree.ancestors(4), vec![2, 1]);
        assert_eq!(tree.chain(4), vec![4, 2, 1]);
        assert_eq!(tree.descendants(1), vec![3, 2, 4]);
        assert_eq!(tree.depth(4), 2);
        assert_eq!(tree.depth(5), 0);
        assert!(tree.chain(99).is_empty());
    }

    #[test]
    fn test_cycle_detection() {
        let tree = sample_tree();
        assert!(tree.would_create_cycle(1, 1));
        assert!(tree.would_create_cycle(1, 4));
        assert!(tree.would_create_cycle(2, 4));
        assert!(!tree.would_create_cycle(4, 3));
        assert!(!tree.would_create_cycle(5, 2));
    }

    #[test]
    fn test_corrupted_loop_terminates() {
        let tree = TagTree::new(vec![tag(1, Some(2), "A"), tag(2, Some(1), "B")]);
        assert_eq!(tree.ancestors(1), vec![2]);
        assert_eq!(tree.descendants(1), vec![2]);
    }

    #[test]
    fn test_expand_with_ancestors_deduplicates() {
        let tree = sample_tree();
        let expanded = tree.expand_with_ancestors(&[4, 3, 2]).unwrap();
        assert_eq!(expanded, BTreeSet::from([1, 2, 3, 4]));

        let missing = tree.expand_with_ancestors(&[42]);
        assert!(matches!(missing, Err(Error::NotFound { id: 42, .. })));
    }

    #[test]
    fn test_categorize_nests_by_chain() {
        let tree = sample_tree();
        let items = vec![
            CategorizedItem {
                subtransaction_id: 10,
                subtotal: dec!(5.00),
                tag_ids: vec![2, 1],
            },
            CategorizedItem {
                subtransaction_id: 11,
                subtotal: dec!(20.00),
                tag_ids: vec![1, 3],
            },
            CategorizedItem {
                subtransaction_id: 12,
                subtotal: dec!(7.50),
                tag_ids: vec![],
            },
            // Diverging branches stay at the root
            CategorizedItem {
                subtransaction_id: 13,
                subtotal: dec!(1.00),
                tag_ids: vec![1, 2, 3],
            },
        ];

        let root = categorize(&tree, &items);
        assert_eq!(root.subtotal(), dec!(33.50));
        assert_eq!(root.items, vec![(12, dec!(7.50)), (13, dec!(1.00))]);

        let transportation = &root.subcategories["Transportation"];
        assert_eq!(transportation.tag_id, Some(1));
        assert_eq!(transportation.subtotal(), dec!(25.00));
        assert_eq!(transportation.subcategories["Parking"].items, vec![(10, dec!(5.00))]);
        assert_eq!(transportation.subcategories["Gas"].subtotal(), dec!(20.00));

        assert_eq!(
            root.chart_slices(&[]),
            vec![
                ("Transportation".to_string(), dec!(25.00)),
                (String::new(), dec!(8.50)),
            ]
        );
        assert_eq!(root.chart_slices(&["Transportation"]).len(), 1);
    }

    #[tokio::test]
    async fn test_create_tag_validation() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "tagger").await?;
        let other = create_test_user(&db, "other").await?;

        let empty = create_tag(&db, user.id, "   ", None).await;
        assert!(matches!(empty, Err(Error::InvalidName { .. })));

        let foreign_parent = create_tag(&db, other.id, "Mine", None).await?;
        let result = create_tag(&db, user.id, "Child", Some(foreign_parent.id)).await;
        assert!(matches!(result, Err(Error::NotFound { entity: "tag", .. })));

        create_tag(&db, user.id, "Groceries", None).await?;
        let duplicate = create_tag(&db, user.id, "groceries", None).await;
        assert!(matches!(duplicate, Err(Error::ConstraintViolation { .. })));

        // Same name for another user is fine
        create_tag(&db, other.id, "Groceries", None).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_find_tag_ignores_case() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "finder").await?;
        let tag = create_tag(&db, user.id, "Transportation", None).await?;

        let found = find_tag(&db, user.id, "transPORTATION").await?;
        assert_eq!(found.map(|t| t.id), Some(tag.id));
        assert!(find_tag(&db, user.id, "Parking").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_set_tag_parent_rejects_cycles() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "cycler").await?;
        let transportation = create_tag(&db, user.id, "Transportation", None).await?;
        let parking = create_tag(&db, user.id, "Parking", Some(transportation.id)).await?;

        let result = set_tag_parent(&db, transportation.id, Some(parking.id)).await;
        assert!(matches!(result, Err(Error::TagCycle { .. })));

        let result = set_tag_parent(&db, parking.id, Some(parking.id)).await;
        assert!(matches!(result, Err(Error::TagCycle { .. })));

        let moved = set_tag_parent(&db, parking.id, None).await?;
        assert_eq!(moved.parent_id, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_rename_and_hierarchy() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "namer").await?;
        let food = create_tag(&db, user.id, "Food", None).await?;
        create_tag(&db, user.id, "Restaurants", Some(food.id)).await?;
        let groceries = create_tag(&db, user.id, "Grocery", Some(food.id)).await?;
        create_tag(&db, user.id, "Utilities", None).await?;

        rename_tag(&db, groceries.id, "Groceries").await?;

        let hierarchy = get_hierarchy(&db, user.id, None).await?;
        let names: Vec<&str> = hierarchy.iter().map(|n| n.tag.tag_name.as_str()).collect();
        assert_eq!(names, vec!["Food", "Utilities"]);
        let children: Vec<&str> = hierarchy[0]
            .children
            .iter()
            .map(|n| n.tag.tag_name.as_str())
            .collect();
        assert_eq!(children, vec!["Groceries", "Restaurants"]);

        let subtags = get_subtags(&db, user.id, Some(food.id)).await?;
        assert_eq!(subtags.len(), 2);
        assert_eq!(get_subtags(&db, user.id, None).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_tag_removes_subtree() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "deleter").await?;
        let transportation = create_tag(&db, user.id, "Transportation", None).await?;
        let parking = create_tag(&db, user.id, "Parking", Some(transportation.id)).await?;

        delete_tag(&db, transportation.id).await?;
        assert!(TransactionTag::find_by_id(parking.id).one(&db).await?.is_none());

        let again = delete_tag(&db, transportation.id).await;
        assert!(matches!(again, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_leaf_tag_links_every_ancestor() -> Result<()> {
        let (db, user, account) = setup_with_bank_account().await?;
        let transportation = create_tag(&db, user.id, "Transportation", None).await?;
        let parking = create_tag(&db, user.id, "Parking", Some(transportation.id)).await?;

        let (_, subtransactions) =
            create_test_bank_transaction(&db, account.id, test_date(2024, 4, 13), -12.0, &[])
                .await?;
        let subtransaction_id = subtransactions[0].id;

        let linked = link_tags_with_ancestors(
            &db,
            user.id,
            TransactionKind::Bank,
            subtransaction_id,
            &[parking.id],
        )
        .await?;
        assert_eq!(linked, BTreeSet::from([transportation.id, parking.id]));

        // Linking again is harmless
        link_tags_with_ancestors(
            &db,
            user.id,
            TransactionKind::Bank,
            subtransaction_id,
            &[parking.id],
        )
        .await?;
        let tags = get_subtransaction_tags(&db, TransactionKind::Bank, subtransaction_id).await?;
        let names: Vec<&str> = tags.iter().map(|t| t.tag_name.as_str()).collect();
        assert_eq!(names, vec!["Parking", "Transportation"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_cannot_link_tags_to_another_users_subtransaction() -> Result<()> {
        let (db, owner, account) = setup_with_bank_account().await?;
        let (_, subtransactions) =
            create_test_bank_transaction(&db, account.id, test_date(2024, 4, 13), -12.0, &[])
                .await?;
        let intruder = create_test_user(&db, "intruder").await?;
        let tag = create_tag(&db, intruder.id, "Stolen", None).await?;

        let result = link_tags_with_ancestors(
            &db,
            intruder.id,
            TransactionKind::Bank,
            subtransactions[0].id,
            &[tag.id],
        )
        .await;
        assert!(matches!(result, Err(Error::NotFound { entity: "subtransaction", .. })));

        let missing = link_tags_with_ancestors(&db, owner.id, TransactionKind::Credit, 9999, &[])
            .await;
        assert!(matches!(missing, Err(Error::NotFound { entity: "subtransaction", .. })));
        assert!(
            get_subtransaction_tags(&db, TransactionKind::Bank, subtransactions[0].id)
                .await?
                .is_empty()
        );
        Ok(())
    }
}
