//! Purchases: raw material receipts with weighted-average costing and
//! cancellation that unwinds them

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{
    MovementKind, Purchase, PurchaseLine, PurchaseLineInput, PurchaseWithLines,
    RawMaterialMovement, StockValuation,
};
use crate::services::raw_materials::{
    lock_raw_material, record_movement, store_valuation, MovementRecord,
};
use shared::{round_money, validate_purchase_lines, PaginatedResponse, Pagination, PaginationMeta};

const PURCHASE_COLUMNS: &str = "id, supplier, purchased_on, total, notes, is_active, \
     cancelled_at, cancelled_by, cancellation_reason, created_by, created_at";

const PURCHASE_REFERENCE: &str = "purchase";
const CANCELLATION_REFERENCE: &str = "purchase_cancellation";

/// Purchase service
#[derive(Clone)]
pub struct PurchaseService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePurchaseInput {
    #[validate(length(min = 1, max = 200))]
    pub supplier: String,
    /// Defaults to today
    pub purchased_on: Option<NaiveDate>,
    pub notes: Option<String>,
    pub lines: Vec<PurchaseLineInput>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PurchaseFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub include_cancelled: bool,
    pub supplier: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PurchaseFilter {
    pub fn pagination(&self) -> Pagination {
        let defaults = Pagination::default();
        Pagination {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CancelPurchaseInput {
    pub reason: Option<String>,
}

/// Stock and cost a raw material returns to when a receipt is undone.
///
/// While the receipt's entry movement is still the last thing that happened
/// to the raw material, the recorded pre-purchase state is restored exactly.
/// Otherwise the receipt is unwound arithmetically from the current state.
pub fn reversal_valuation(
    current: StockValuation,
    entry: Option<&RawMaterialMovement>,
    superseded: bool,
    quantity: Decimal,
    unit_price: Decimal,
) -> StockValuation {
    match entry {
        Some(entry) if !superseded => StockValuation::new(entry.stock_before, entry.cost_before),
        _ => current.reverse_receipt(quantity, unit_price),
    }
}

/// A purchase line and the entry movement that received it, if one is found
pub type ReceiptStep<'a> = (&'a PurchaseLine, Option<&'a RawMaterialMovement>);

/// Outcome of undoing one purchase line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptReversal {
    pub raw_material_id: Uuid,
    pub before: StockValuation,
    pub after: StockValuation,
    /// Restored from the recorded pre-purchase state
    pub exact: bool,
}

/// Pair every line with its entry movement, newest receipt first.
///
/// Entries are matched on raw material and quantity. For one raw material a
/// later entry starts from a higher stock, which orders entries sharing a
/// timestamp. Lines left without an entry come last.
pub fn pair_receipts<'a>(
    lines: &'a [PurchaseLine],
    entries: &'a [RawMaterialMovement],
) -> Vec<ReceiptStep<'a>> {
    let mut ordered: Vec<&RawMaterialMovement> = entries.iter().collect();
    ordered.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.stock_before.cmp(&a.stock_before))
    });

    let mut pending: Vec<&PurchaseLine> = lines.iter().collect();
    let mut steps = Vec::with_capacity(lines.len());
    for entry in ordered {
        if let Some(pos) = pending
            .iter()
            .position(|l| l.raw_material_id == entry.raw_material_id && l.quantity == entry.quantity)
        {
            steps.push((pending.remove(pos), Some(entry)));
        }
    }
    steps.extend(pending.into_iter().map(|line| (line, None)));
    steps
}

/// Unwind the paired receipts in order, each one starting from the valuation
/// the previous one left behind.
///
/// `superseded` holds the entry ids that other operations have moved past;
/// those and unpaired lines are unwound arithmetically.
pub fn plan_reversal(
    mut current: HashMap<Uuid, StockValuation>,
    steps: &[ReceiptStep<'_>],
    superseded: &HashSet<Uuid>,
) -> Vec<ReceiptReversal> {
    let mut reversals = Vec::with_capacity(steps.len());
    for (line, entry) in steps {
        let Some(before) = current.get(&line.raw_material_id).copied() else {
            continue;
        };
        let overtaken = entry.map_or(true, |e| superseded.contains(&e.id));
        let after = reversal_valuation(before, *entry, overtaken, line.quantity, line.unit_price);

        current.insert(line.raw_material_id, after);
        reversals.push(ReceiptReversal {
            raw_material_id: line.raw_material_id,
            before,
            after,
            exact: !overtaken,
        });
    }
    reversals
}

async fn load_lines(conn: &mut PgConnection, purchase_id: Uuid) -> AppResult<Vec<PurchaseLine>> {
    let lines = sqlx::query_as::<_, PurchaseLine>(
        r#"
        SELECT pl.id, pl.purchase_id, pl.raw_material_id, rm.name AS raw_material_name,
               pl.quantity, pl.total_price, pl.unit_price
        FROM purchase_lines pl
        JOIN raw_materials rm ON rm.id = pl.raw_material_id
        WHERE pl.purchase_id = $1
        ORDER BY rm.name
        "#,
    )
    .bind(purchase_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(lines)
}

impl PurchaseService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Record a purchase, adding stock and re-averaging each unit cost
    pub async fn create(
        &self,
        user_id: Uuid,
        input: CreatePurchaseInput,
    ) -> AppResult<PurchaseWithLines> {
        input.validate()?;
        validate_purchase_lines(&input.lines)?;

        let mut tx = self.db.begin().await?;

        // Lock in id order; a raw material may appear on several lines
        let ids: BTreeSet<Uuid> = input.lines.iter().map(|l| l.raw_material_id).collect();
        let mut state: HashMap<Uuid, (String, StockValuation)> = HashMap::with_capacity(ids.len());
        for id in ids {
            let raw = lock_raw_material(&mut tx, id).await?;
            state.insert(
                id,
                (raw.name, StockValuation::new(raw.current_stock, raw.unit_cost)),
            );
        }

        let total = round_money(input.lines.iter().map(|l| l.total_price).sum());
        let purchase = sqlx::query_as::<_, Purchase>(&format!(
            r#"
            INSERT INTO purchases (supplier, purchased_on, total, notes, created_by)
            VALUES ($1, COALESCE($2, CURRENT_DATE), $3, $4, $5)
            RETURNING {}
            "#,
            PURCHASE_COLUMNS
        ))
        .bind(input.supplier.trim())
        .bind(input.purchased_on)
        .bind(total)
        .bind(&input.notes)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let reason = format!("Purchase from {}", purchase.supplier);
        let mut lines = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            let Some((name, before)) = state.get(&line.raw_material_id).cloned() else {
                continue;
            };
            let unit_price = line.unit_price();
            let after = before.receive(line.quantity, unit_price);

            let id: Uuid = sqlx::query_scalar(
                r#"
                INSERT INTO purchase_lines (purchase_id, raw_material_id, quantity, total_price, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                "#,
            )
            .bind(purchase.id)
            .bind(line.raw_material_id)
            .bind(line.quantity)
            .bind(line.total_price)
            .bind(unit_price)
            .fetch_one(&mut *tx)
            .await?;

            store_valuation(&mut tx, line.raw_material_id, after).await?;
            record_movement(
                &mut tx,
                MovementRecord {
                    raw_material_id: line.raw_material_id,
                    kind: MovementKind::Entry,
                    quantity: line.quantity,
                    before,
                    after,
                    reason: Some(reason.as_str()),
                    reference: Some((PURCHASE_REFERENCE, purchase.id)),
                    user_id: Some(user_id),
                },
            )
            .await?;

            if after.unit_cost != before.unit_cost {
                tracing::info!(
                    raw_material_id = %line.raw_material_id,
                    old_cost = %before.unit_cost,
                    new_cost = %after.unit_cost,
                    "Weighted average cost recalculated"
                );
            }

            state.insert(line.raw_material_id, (name.clone(), after));
            lines.push(PurchaseLine {
                id,
                purchase_id: purchase.id,
                raw_material_id: line.raw_material_id,
                raw_material_name: name,
                quantity: line.quantity,
                total_price: line.total_price,
                unit_price,
            });
        }

        tx.commit().await?;

        tracing::info!(
            purchase_id = %purchase.id,
            user_id = %user_id,
            supplier = %purchase.supplier,
            total = %purchase.total,
            lines = lines.len(),
            "Purchase created"
        );

        Ok(PurchaseWithLines { purchase, lines })
    }

    /// Purchases in a date range, newest first
    pub async fn list(&self, filter: &PurchaseFilter) -> AppResult<PaginatedResponse<Purchase>> {
        let pagination = filter.pagination();
        let supplier = filter.supplier.as_deref().map(|s| format!("%{}%", s.trim()));

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM purchases
            WHERE (is_active OR $1)
              AND ($2::date IS NULL OR purchased_on >= $2)
              AND ($3::date IS NULL OR purchased_on <= $3)
              AND ($4::text IS NULL OR supplier ILIKE $4)
            "#,
        )
        .bind(filter.include_cancelled)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(&supplier)
        .fetch_one(&self.db)
        .await?;

        let purchases = sqlx::query_as::<_, Purchase>(&format!(
            r#"
            SELECT {}
            FROM purchases
            WHERE (is_active OR $1)
              AND ($2::date IS NULL OR purchased_on >= $2)
              AND ($3::date IS NULL OR purchased_on <= $3)
              AND ($4::text IS NULL OR supplier ILIKE $4)
            ORDER BY purchased_on DESC, created_at DESC
            LIMIT $5 OFFSET $6
            "#,
            PURCHASE_COLUMNS
        ))
        .bind(filter.include_cancelled)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(&supplier)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse {
            data: purchases,
            pagination: PaginationMeta::new(&pagination, total.max(0) as u64),
        })
    }

    pub async fn get(&self, purchase_id: Uuid) -> AppResult<PurchaseWithLines> {
        let mut conn = self.db.acquire().await?;

        let purchase = sqlx::query_as::<_, Purchase>(&format!(
            "SELECT {} FROM purchases WHERE id = $1",
            PURCHASE_COLUMNS
        ))
        .bind(purchase_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Purchase {}", purchase_id)))?;

        let lines = load_lines(&mut conn, purchase_id).await?;
        Ok(PurchaseWithLines { purchase, lines })
    }

    /// Cancel a purchase, taking its stock back out and restoring costs
    pub async fn cancel(
        &self,
        user_id: Uuid,
        purchase_id: Uuid,
        reason: Option<String>,
    ) -> AppResult<PurchaseWithLines> {
        let mut tx = self.db.begin().await?;

        let purchase = sqlx::query_as::<_, Purchase>(&format!(
            "SELECT {} FROM purchases WHERE id = $1 FOR UPDATE",
            PURCHASE_COLUMNS
        ))
        .bind(purchase_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Purchase {}", purchase_id)))?;

        if !purchase.is_active {
            return Err(AppError::InvalidStateTransition(format!(
                "Purchase {} is already cancelled",
                purchase_id
            )));
        }

        let lines = load_lines(&mut tx, purchase_id).await?;

        let ids: BTreeSet<Uuid> = lines.iter().map(|l| l.raw_material_id).collect();
        let mut current: HashMap<Uuid, StockValuation> = HashMap::with_capacity(ids.len());
        for id in ids {
            let raw = lock_raw_material(&mut tx, id).await?;
            current.insert(id, StockValuation::new(raw.current_stock, raw.unit_cost));
        }

        let entries = sqlx::query_as::<_, RawMaterialMovement>(
            r#"
            SELECT id, raw_material_id, kind, quantity, stock_before, stock_after,
                   cost_before, cost_after, reason, reference_kind, reference_id, user_id, created_at
            FROM raw_material_movements
            WHERE reference_kind = $1 AND reference_id = $2 AND kind = 'entry'
            "#,
        )
        .bind(PURCHASE_REFERENCE)
        .bind(purchase_id)
        .fetch_all(&mut *tx)
        .await?;

        let steps = pair_receipts(&lines, &entries);

        let mut superseded = HashSet::new();
        for entry in steps.iter().filter_map(|(_, entry)| *entry) {
            let overtaken = sqlx::query_scalar::<_, bool>(
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM raw_material_movements
                    WHERE raw_material_id = $1
                      AND created_at > $2
                      AND reference_id IS DISTINCT FROM $3
                )
                "#,
            )
            .bind(entry.raw_material_id)
            .bind(entry.created_at)
            .bind(purchase_id)
            .fetch_one(&mut *tx)
            .await?;
            if overtaken {
                superseded.insert(entry.id);
            }
        }

        let reason_text = reason
            .clone()
            .unwrap_or_else(|| format!("Cancellation of purchase from {}", purchase.supplier));

        for reversal in plan_reversal(current, &steps, &superseded) {
            store_valuation(&mut tx, reversal.raw_material_id, reversal.after).await?;
            record_movement(
                &mut tx,
                MovementRecord {
                    raw_material_id: reversal.raw_material_id,
                    kind: MovementKind::Exit,
                    quantity: (reversal.before.stock - reversal.after.stock).max(Decimal::ZERO),
                    before: reversal.before,
                    after: reversal.after,
                    reason: Some(reason_text.as_str()),
                    reference: Some((CANCELLATION_REFERENCE, purchase_id)),
                    user_id: Some(user_id),
                },
            )
            .await?;

            tracing::info!(
                raw_material_id = %reversal.raw_material_id,
                exact = reversal.exact,
                old_cost = %reversal.before.unit_cost,
                new_cost = %reversal.after.unit_cost,
                "Purchase receipt reversed"
            );
        }

        let purchase = sqlx::query_as::<_, Purchase>(&format!(
            r#"
            UPDATE purchases
            SET is_active = FALSE, cancelled_at = NOW(), cancelled_by = $1, cancellation_reason = $2
            WHERE id = $3
            RETURNING {}
            "#,
            PURCHASE_COLUMNS
        ))
        .bind(user_id)
        .bind(&reason)
        .bind(purchase_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            purchase_id = %purchase_id,
            user_id = %user_id,
            lines = lines.len(),
            "Purchase cancelled"
        );

        Ok(PurchaseWithLines { purchase, lines })
    }
}
