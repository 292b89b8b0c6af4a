//! crates/shop_core/src/reconcile.rs
//!
//! Moves a guest's cart into a freshly authenticated user's cart.
//!
//! Every guest line is an independent unit of work: it is either merged into
//! the user's line for the same product or handed over to the user as-is.
//! A failing line is logged and counted but never stops its siblings, and a
//! second run over an already migrated token finds nothing to do.

use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::{CartLine, GuestToken, OwnerIdentity, PrincipalId, Quantity};
use crate::ports::{CartStore, PortError, PortResult};

/// What happened to one guest line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// Quantity added to the user's existing line; the guest line was deleted.
    Merged,
    /// The guest line now belongs to the user.
    Reassigned,
    /// The guest line disappeared before it could be moved (a concurrent run got it).
    AlreadyMoved,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub merged: usize,
    pub reassigned: usize,
    pub already_moved: usize,
    pub failed: usize,
}

impl ReconcileReport {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }

    fn record(&mut self, outcome: LineOutcome) {
        match outcome {
            LineOutcome::Merged => self.merged += 1,
            LineOutcome::Reassigned => self.reassigned += 1,
            LineOutcome::AlreadyMoved => self.already_moved += 1,
        }
    }
}

#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn CartStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn CartStore>) -> Self {
        Self { store }
    }

    /// Merges every line owned by `guest` into `user_id`'s cart.
    ///
    /// Only fails when the guest's lines cannot be read at all; per-line
    /// failures are reported through [`ReconcileReport::failed`].
    pub async fn reconcile(&self, guest: GuestToken, user_id: PrincipalId) -> PortResult<ReconcileReport> {
        let guest_lines = self.store.all_lines(&OwnerIdentity::Guest(guest)).await?;
        let mut report = ReconcileReport::default();

        for line in &guest_lines {
            match self.move_line(line, user_id).await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    warn!(
                        guest = %guest,
                        user_id,
                        line_id = line.id,
                        product_id = line.product_id,
                        error = %e,
                        "Failed to move guest cart line"
                    );
                    report.failed += 1;
                }
            }
        }

        if !guest_lines.is_empty() {
            info!(
                guest = %guest,
                user_id,
                merged = report.merged,
                reassigned = report.reassigned,
                failed = report.failed,
                "Guest cart reconciled"
            );
        }
        Ok(report)
    }

    async fn move_line(&self, line: &CartLine, user_id: PrincipalId) -> PortResult<LineOutcome> {
        let user = OwnerIdentity::User(user_id);
        match self.store.find_line(&user, line.product_id).await? {
            Some(existing) => self.merge(line, &existing).await,
            None => match self.reassign(line, user_id).await {
                // The user gained a line for this product after the lookup.
                Err(PortError::Conflict(_)) => {
                    let existing = self
                        .store
                        .find_line(&user, line.product_id)
                        .await?
                        .ok_or_else(|| {
                            PortError::Unexpected(format!(
                                "conflicting line for product {} vanished",
                                line.product_id
                            ))
                        })?;
                    self.merge(line, &existing).await
                }
                other => other,
            },
        }
    }

    /// Conflict branch: fold the guest quantity into the user's line.
    /// A sum above [`Quantity::MAX`] is capped so the move still completes.
    async fn merge(&self, guest_line: &CartLine, user_line: &CartLine) -> PortResult<LineOutcome> {
        match self.store.merge_line(guest_line, user_line).await {
            Ok(merged) => {
                if merged.quantity.get() == Quantity::MAX {
                    warn!(
                        line_id = merged.id,
                        product_id = merged.product_id,
                        "Merged cart line capped at the quantity limit"
                    );
                }
                Ok(LineOutcome::Merged)
            }
            Err(PortError::NotFound(_)) => Ok(LineOutcome::AlreadyMoved),
            Err(e) => Err(e),
        }
    }

    /// Fresh branch: the user has no line for this product yet.
    async fn reassign(&self, guest_line: &CartLine, user_id: PrincipalId) -> PortResult<LineOutcome> {
        match self.store.reassign_line(guest_line, user_id).await {
            Ok(_) => Ok(LineOutcome::Reassigned),
            Err(PortError::NotFound(_)) => Ok(LineOutcome::AlreadyMoved),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProductId;
    use crate::memory::InMemoryStore;
    use crate::pagination::PageRequest;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    fn qty(n: i64) -> Quantity {
        Quantity::new(n).unwrap()
    }

    async fn quantities(store: &dyn CartStore, owner: OwnerIdentity) -> BTreeMap<ProductId, i32> {
        store
            .all_lines(&owner)
            .await
            .unwrap()
            .into_iter()
            .map(|l| (l.product_id, l.quantity.get()))
            .collect()
    }

    #[tokio::test]
    async fn conflicting_product_quantities_are_summed() {
        let store = Arc::new(InMemoryStore::new());
        let guest = GuestToken::generate();
        let user = OwnerIdentity::User(1);
        store.add_quantity(&OwnerIdentity::Guest(guest), 10, qty(2)).await.unwrap();
        store.add_quantity(&user, 10, qty(3)).await.unwrap();

        let report = Reconciler::new(store.clone()).reconcile(guest, 1).await.unwrap();

        assert_eq!(report.merged, 1);
        assert_eq!(quantities(store.as_ref(), user).await, BTreeMap::from([(10, 5)]));
        assert!(quantities(store.as_ref(), OwnerIdentity::Guest(guest)).await.is_empty());
    }

    #[tokio::test]
    async fn merged_quantity_is_capped_and_the_move_completes() {
        let store = Arc::new(InMemoryStore::new());
        let guest = GuestToken::generate();
        let user = OwnerIdentity::User(1);
        store.add_quantity(&user, 10, qty(1)).await.unwrap();
        store
            .add_quantity(&OwnerIdentity::Guest(guest), 10, qty(i64::from(Quantity::MAX)))
            .await
            .unwrap();

        let report = Reconciler::new(store.clone()).reconcile(guest, 1).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.merged, 1);
        assert_eq!(
            quantities(store.as_ref(), user).await,
            BTreeMap::from([(10, Quantity::MAX)])
        );
        assert!(quantities(store.as_ref(), OwnerIdentity::Guest(guest)).await.is_empty());
    }

    #[tokio::test]
    async fn fresh_product_line_is_reowned_not_copied() {
        let store = Arc::new(InMemoryStore::new());
        let guest = GuestToken::generate();
        let guest_line_before = store
            .add_quantity(&OwnerIdentity::Guest(guest), 20, qty(1))
            .await
            .unwrap();

        let report = Reconciler::new(store.clone()).reconcile(guest, 1).await.unwrap();

        assert_eq!(report.reassigned, 1);
        let moved = store
            .find_line(&OwnerIdentity::User(1), 20)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(moved.id, guest_line_before.id);
        assert_eq!(moved.quantity.get(), 1);
        assert_eq!(store.line_count(), 1);
    }

    #[tokio::test]
    async fn resulting_quantities_never_duplicate() {
        let store = Arc::new(InMemoryStore::new());
        let guest = GuestToken::generate();
        let guest_owner = OwnerIdentity::Guest(guest);
        let user = OwnerIdentity::User(7);
        store.add_quantity(&guest_owner, 1, qty(2)).await.unwrap();
        store.add_quantity(&guest_owner, 2, qty(4)).await.unwrap();
        store.add_quantity(&user, 2, qty(1)).await.unwrap();
        store.add_quantity(&user, 3, qty(6)).await.unwrap();

        Reconciler::new(store.clone()).reconcile(guest, 7).await.unwrap();

        assert_eq!(
            quantities(store.as_ref(), user).await,
            BTreeMap::from([(1, 2), (2, 5), (3, 6)])
        );
        assert!(quantities(store.as_ref(), guest_owner).await.is_empty());
    }

    #[tokio::test]
    async fn running_twice_is_a_no_op() {
        let store = Arc::new(InMemoryStore::new());
        let guest = GuestToken::generate();
        store.add_quantity(&OwnerIdentity::Guest(guest), 1, qty(2)).await.unwrap();
        store.add_quantity(&OwnerIdentity::User(1), 1, qty(3)).await.unwrap();
        let reconciler = Reconciler::new(store.clone());

        reconciler.reconcile(guest, 1).await.unwrap();
        let after_first = quantities(store.as_ref(), OwnerIdentity::User(1)).await;
        let second = reconciler.reconcile(guest, 1).await.unwrap();

        assert_eq!(second, ReconcileReport::default());
        assert_eq!(quantities(store.as_ref(), OwnerIdentity::User(1)).await, after_first);
    }

    #[tokio::test]
    async fn empty_guest_cart_is_a_valid_outcome() {
        let store = Arc::new(InMemoryStore::new());
        let report = Reconciler::new(store.clone())
            .reconcile(GuestToken::generate(), 1)
            .await
            .unwrap();
        assert!(report.is_complete());
        assert_eq!(report, ReconcileReport::default());
    }

    /// Fails every merge and reassignment for one product.
    struct FlakyStore {
        inner: InMemoryStore,
        poisoned_product: ProductId,
    }

    #[async_trait]
    impl CartStore for FlakyStore {
        async fn find_line(&self, owner: &OwnerIdentity, product_id: ProductId) -> PortResult<Option<CartLine>> {
            self.inner.find_line(owner, product_id).await
        }
        async fn add_quantity(&self, owner: &OwnerIdentity, product_id: ProductId, quantity: Quantity) -> PortResult<CartLine> {
            self.inner.add_quantity(owner, product_id, quantity).await
        }
        async fn remove_line(&self, owner: &OwnerIdentity, product_id: ProductId) -> PortResult<bool> {
            self.inner.remove_line(owner, product_id).await
        }
        async fn list_lines(&self, owner: &OwnerIdentity, page: PageRequest) -> PortResult<(Vec<CartLine>, u64)> {
            self.inner.list_lines(owner, page).await
        }
        async fn all_lines(&self, owner: &OwnerIdentity) -> PortResult<Vec<CartLine>> {
            self.inner.all_lines(owner).await
        }
        async fn merge_line(&self, guest_line: &CartLine, user_line: &CartLine) -> PortResult<CartLine> {
            if guest_line.product_id == self.poisoned_product {
                return Err(PortError::Unexpected("disk on fire".to_string()));
            }
            self.inner.merge_line(guest_line, user_line).await
        }
        async fn reassign_line(&self, guest_line: &CartLine, user_id: PrincipalId) -> PortResult<CartLine> {
            if guest_line.product_id == self.poisoned_product {
                return Err(PortError::Unexpected("disk on fire".to_string()));
            }
            self.inner.reassign_line(guest_line, user_id).await
        }
    }

    #[tokio::test]
    async fn one_failing_line_does_not_block_the_others_and_retry_converges() {
        let store = Arc::new(FlakyStore {
            inner: InMemoryStore::new(),
            poisoned_product: 2,
        });
        let guest = GuestToken::generate();
        let guest_owner = OwnerIdentity::Guest(guest);
        for product in 1..=3 {
            store.add_quantity(&guest_owner, product, qty(1)).await.unwrap();
        }

        let report = Reconciler::new(store.clone()).reconcile(guest, 5).await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.reassigned, 2);
        assert!(!report.is_complete());
        assert_eq!(
            quantities(store.as_ref(), OwnerIdentity::User(5)).await,
            BTreeMap::from([(1, 1), (3, 1)])
        );
        assert_eq!(
            quantities(store.as_ref(), guest_owner).await,
            BTreeMap::from([(2, 1)])
        );

        // Once storage recovers, a retry moves only what is left.
        let healed = Reconciler::new(Arc::new(HealedView(store.clone())));
        let retry = healed.reconcile(guest, 5).await.unwrap();
        assert_eq!(retry.reassigned, 1);
        assert_eq!(
            quantities(store.as_ref(), OwnerIdentity::User(5)).await,
            BTreeMap::from([(1, 1), (2, 1), (3, 1)])
        );
    }

    /// Bypasses the poison of a `FlakyStore`.
    struct HealedView(Arc<FlakyStore>);

    #[async_trait]
    impl CartStore for HealedView {
        async fn find_line(&self, owner: &OwnerIdentity, product_id: ProductId) -> PortResult<Option<CartLine>> {
            self.0.inner.find_line(owner, product_id).await
        }
        async fn add_quantity(&self, owner: &OwnerIdentity, product_id: ProductId, quantity: Quantity) -> PortResult<CartLine> {
            self.0.inner.add_quantity(owner, product_id, quantity).await
        }
        async fn remove_line(&self, owner: &OwnerIdentity, product_id: ProductId) -> PortResult<bool> {
            self.0.inner.remove_line(owner, product_id).await
        }
        async fn list_lines(&self, owner: &OwnerIdentity, page: PageRequest) -> PortResult<(Vec<CartLine>, u64)> {
            self.0.inner.list_lines(owner, page).await
        }
        async fn all_lines(&self, owner: &OwnerIdentity) -> PortResult<Vec<CartLine>> {
            self.0.inner.all_lines(owner).await
        }
        async fn merge_line(&self, guest_line: &CartLine, user_line: &CartLine) -> PortResult<CartLine> {
            self.0.inner.merge_line(guest_line, user_line).await
        }
        async fn reassign_line(&self, guest_line: &CartLine, user_id: PrincipalId) -> PortResult<CartLine> {
            self.0.inner.reassign_line(guest_line, user_id).await
        }
    }

    /// Simulates a concurrent add landing between the lookup and the reassignment.
    struct RacingStore {
        inner: InMemoryStore,
    }

    #[async_trait]
    impl CartStore for RacingStore {
        async fn find_line(&self, owner: &OwnerIdentity, product_id: ProductId) -> PortResult<Option<CartLine>> {
            self.inner.find_line(owner, product_id).await
        }
        async fn add_quantity(&self, owner: &OwnerIdentity, product_id: ProductId, quantity: Quantity) -> PortResult<CartLine> {
            self.inner.add_quantity(owner, product_id, quantity).await
        }
        async fn remove_line(&self, owner: &OwnerIdentity, product_id: ProductId) -> PortResult<bool> {
            self.inner.remove_line(owner, product_id).await
        }
        async fn list_lines(&self, owner: &OwnerIdentity, page: PageRequest) -> PortResult<(Vec<CartLine>, u64)> {
            self.inner.list_lines(owner, page).await
        }
        async fn all_lines(&self, owner: &OwnerIdentity) -> PortResult<Vec<CartLine>> {
            self.inner.all_lines(owner).await
        }
        async fn merge_line(&self, guest_line: &CartLine, user_line: &CartLine) -> PortResult<CartLine> {
            self.inner.merge_line(guest_line, user_line).await
        }
        async fn reassign_line(&self, guest_line: &CartLine, user_id: PrincipalId) -> PortResult<CartLine> {
            self.inner
                .add_quantity(&OwnerIdentity::User(user_id), guest_line.product_id, qty(4))
                .await?;
            self.inner.reassign_line(guest_line, user_id).await
        }
    }

    #[tokio::test]
    async fn concurrent_add_during_reassignment_falls_back_to_merge() {
        let store = Arc::new(RacingStore {
            inner: InMemoryStore::new(),
        });
        let guest = GuestToken::generate();
        store.add_quantity(&OwnerIdentity::Guest(guest), 8, qty(2)).await.unwrap();

        let report = Reconciler::new(store.clone()).reconcile(guest, 3).await.unwrap();

        assert_eq!(report.merged, 1);
        assert_eq!(
            quantities(store.as_ref(), OwnerIdentity::User(3)).await,
            BTreeMap::from([(8, 6)])
        );
        assert!(quantities(store.as_ref(), OwnerIdentity::Guest(guest)).await.is_empty());
    }
}
