//! Fulfillment business logic - Turns a buyer's cart into a pending transaction,
//! its detail snapshots, and one pending ticket per purchased unit.
//!
//! Issuance is all-or-nothing: the quota check, transaction, details, tickets and
//! cart cleanup share one database transaction. The payment session is requested
//! only after that commit, keyed by the transaction id, so a gateway outage leaves a
//! retryable pending transaction and never a half-issued order.

use crate::{
    config::settings::Settings,
    core::cart::cart_lines,
    core::event::get_ticket_category,
    core::identity::AuthIdentity,
    core::ids,
    core::ticket::DEFAULT_TAG,
    entities::{
        CartLine, TicketStatus, Transaction, TransactionDetail, TransactionStatus, cart_line,
        ticket, transaction, transaction_detail,
    },
    errors::{Error, Result},
    gateway::{PaymentGateway, PaymentItem, PaymentRequest, PaymentSession},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Serialize;
use tracing::{info, instrument, warn};

/// Everything a successful checkout produced.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutReceipt {
    /// The pending transaction; carries the payment link when one was obtained
    pub transaction: transaction::Model,
    /// One immutable snapshot per cart line
    pub details: Vec<transaction_detail::Model>,
    /// One pending ticket per purchased unit
    pub tickets: Vec<ticket::Model>,
    /// `None` when the gateway could not be reached; see [`resume_payment`]
    pub payment: Option<PaymentSession>,
}

/// A transaction and its detail lines.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionView {
    /// Header row
    pub transaction: transaction::Model,
    /// Detail snapshots
    pub details: Vec<transaction_detail::Model>,
}

/// Checks out the buyer's whole cart.
///
/// # Errors
/// Returns an error if:
/// - The caller is not a buyer
/// - The cart is empty ([`Error::EmptyCart`])
/// - Any line asks for more than `quota - sold` ([`Error::QuotaExceeded`]); nothing is
///   written in that case
/// - The database transaction fails
///
/// A gateway failure is not an error here: the order is committed and the receipt
/// carries `payment: None`.
#[instrument(skip(db, gateway, settings), fields(owner = %buyer.user_id))]
pub async fn checkout(
    db: &DatabaseConnection,
    gateway: &dyn PaymentGateway,
    settings: &Settings,
    buyer: &AuthIdentity,
) -> Result<CheckoutReceipt> {
    buyer.require_buyer()?;

    let txn = db.begin().await?;

    let lines = cart_lines(&txn, &buyer.user_id).await?;
    if lines.is_empty() {
        return Err(Error::EmptyCart);
    }

    let mut priced = Vec::with_capacity(lines.len());
    for line in lines {
        let category = get_ticket_category(&txn, &line.ticket_category_id)
            .await?
            .ok_or_else(|| Error::not_found("TicketCategory", &line.ticket_category_id))?;
        if line.quantity > category.remaining() {
            warn!(
                category_id = %category.id,
                requested = line.quantity,
                available = category.remaining(),
                "Checkout rejected, quota exceeded"
            );
            return Err(Error::QuotaExceeded {
                category: category.name.clone(),
                requested: line.quantity,
                available: category.remaining(),
            });
        }
        priced.push((line, category));
    }

    let price_total: f64 = priced.iter().map(|(line, _)| line.price_total).sum();
    let now = Utc::now();
    let ticket_expiry = now + settings.fulfillment.pending_ticket_ttl();

    let transaction = transaction::ActiveModel {
        id: Set(ids::transaction_id()),
        owner_id: Set(buyer.user_id.clone()),
        price_total: Set(price_total),
        status: Set(TransactionStatus::Pending),
        link_payment: Set(None),
        payment_token: Set(None),
        settled_at: Set(None),
        created_at: Set(now),
    }
    .insert(&txn)
    .await?;

    let mut details = Vec::with_capacity(priced.len());
    let mut tickets = Vec::new();
    let mut items = Vec::with_capacity(priced.len());
    for (line, category) in &priced {
        let detail = transaction_detail::ActiveModel {
            id: Set(ids::transaction_detail_id()),
            transaction_id: Set(transaction.id.clone()),
            ticket_category_id: Set(category.id.clone()),
            owner_id: Set(buyer.user_id.clone()),
            quantity: Set(line.quantity),
            subtotal: Set(line.price_total),
        }
        .insert(&txn)
        .await?;

        for _ in 0..line.quantity {
            let ticket = ticket::ActiveModel {
                id: Set(ids::ticket_id()),
                event_id: Set(category.event_id.clone()),
                ticket_category_id: Set(category.id.clone()),
                transaction_id: Set(transaction.id.clone()),
                owner_id: Set(buyer.user_id.clone()),
                status: Set(TicketStatus::Pending),
                code: Set(ids::ticket_code()),
                expires_at: Set(Some(ticket_expiry)),
                tag: Set(DEFAULT_TAG.to_string()),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?;
            tickets.push(ticket);
        }

        items.push(payment_item(&detail, &category.name));
        details.push(detail);
    }

    CartLine::delete_many()
        .filter(cart_line::Column::OwnerId.eq(&buyer.user_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;
    info!(
        transaction_id = %transaction.id,
        tickets = tickets.len(),
        price_total,
        "Checkout committed"
    );

    let request = PaymentRequest {
        order_id: transaction.id.clone(),
        gross_amount: transaction.price_total,
        items,
        customer_id: buyer.user_id.clone(),
    };
    let mut transaction = transaction;
    let payment = match request_session(db, gateway, request).await {
        Ok(session) => {
            transaction.link_payment = Some(session.redirect_url.clone());
            transaction.payment_token = Some(session.token.clone());
            Some(session)
        }
        Err(e) => {
            warn!(
                transaction_id = %transaction.id,
                error = %e,
                "Payment session not created, transaction left pending"
            );
            None
        }
    };

    Ok(CheckoutReceipt {
        transaction,
        details,
        tickets,
        payment,
    })
}

/// Returns the payment session of a pending transaction, requesting it again from
/// the gateway if checkout could not obtain one.
///
/// The transaction id is the gateway's order id, so retries never open a second
/// session for the same order and never issue new tickets.
///
/// # Errors
/// Returns an error if the transaction is not the caller's, is no longer pending
/// ([`Error::TransactionClosed`]), or the gateway call fails.
#[instrument(skip(db, gateway), fields(owner = %buyer.user_id))]
pub async fn resume_payment(
    db: &DatabaseConnection,
    gateway: &dyn PaymentGateway,
    buyer: &AuthIdentity,
    transaction_id: &str,
) -> Result<PaymentSession> {
    let transaction = find_owned_transaction(db, &buyer.user_id, transaction_id).await?;
    if transaction.status != TransactionStatus::Pending {
        return Err(Error::TransactionClosed {
            transaction_id: transaction.id,
            status: transaction.status,
        });
    }

    if let (Some(redirect_url), Some(token)) = (transaction.link_payment, transaction.payment_token)
    {
        return Ok(PaymentSession {
            token,
            redirect_url,
        });
    }

    let details = transaction_details(db, &transaction.id).await?;
    let mut items = Vec::with_capacity(details.len());
    for detail in &details {
        let name = get_ticket_category(db, &detail.ticket_category_id)
            .await?
            .map_or_else(|| detail.ticket_category_id.clone(), |c| c.name);
        items.push(payment_item(detail, &name));
    }

    let request = PaymentRequest {
        order_id: transaction.id,
        gross_amount: transaction.price_total,
        items,
        customer_id: transaction.owner_id,
    };
    request_session(db, gateway, request).await
}

/// Lists the buyer's transactions, newest first.
pub async fn list_transactions(
    db: &DatabaseConnection,
    buyer: &AuthIdentity,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::OwnerId.eq(&buyer.user_id))
        .order_by_desc(transaction::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Returns one of the buyer's transactions with its details.
///
/// # Errors
/// Returns [`Error::NotFound`] when the caller has no such transaction.
pub async fn get_transaction(
    db: &DatabaseConnection,
    buyer: &AuthIdentity,
    transaction_id: &str,
) -> Result<TransactionView> {
    let transaction = find_owned_transaction(db, &buyer.user_id, transaction_id).await?;
    let details = transaction_details(db, &transaction.id).await?;
    Ok(TransactionView {
        transaction,
        details,
    })
}

/// Detail snapshots of a transaction.
pub(crate) async fn transaction_details<C>(
    db: &C,
    transaction_id: &str,
) -> Result<Vec<transaction_detail::Model>>
where
    C: ConnectionTrait,
{
    TransactionDetail::find()
        .filter(transaction_detail::Column::TransactionId.eq(transaction_id))
        .all(db)
        .await
        .map_err(Into::into)
}

async fn find_owned_transaction(
    db: &DatabaseConnection,
    owner_id: &str,
    transaction_id: &str,
) -> Result<transaction::Model> {
    Transaction::find_by_id(transaction_id.to_string())
        .filter(transaction::Column::OwnerId.eq(owner_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Transaction", transaction_id))
}

fn payment_item(detail: &transaction_detail::Model, name: &str) -> PaymentItem {
    let unit_price = if detail.quantity > 0 {
        detail.subtotal / f64::from(detail.quantity)
    } else {
        0.0
    };
    PaymentItem {
        id: detail.ticket_category_id.clone(),
        name: name.to_string(),
        unit_price,
        quantity: detail.quantity,
    }
}

/// Calls the gateway and stores the session on the transaction while it is still
/// pending.
async fn request_session(
    db: &DatabaseConnection,
    gateway: &dyn PaymentGateway,
    request: PaymentRequest,
) -> Result<PaymentSession> {
    let order_id = request.order_id.clone();
    let session = gateway.create_session(request).await?;

    Transaction::update_many()
        .col_expr(
            transaction::Column::LinkPayment,
            Expr::value(Some(session.redirect_url.clone())),
        )
        .col_expr(
            transaction::Column::PaymentToken,
            Expr::value(Some(session.token.clone())),
        )
        .filter(transaction::Column::Id.eq(&order_id))
        .filter(transaction::Column::Status.eq(TransactionStatus::Pending))
        .exec(db)
        .await?;

    info!(transaction_id = %order_id, "Payment session attached");
    Ok(session)
}
