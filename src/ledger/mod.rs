//! Transactional credit ledger.
//!
//! The `users` and `payments` collections form one consistency domain: credits
//! are granted exactly once per approved payment and a balance can never go
//! negative. Approval runs the status transition and the credit grant inside a
//! single MongoDB session transaction; deduction is a conditional
//! single-document update. Everything else in the service is glue around these
//! operations.

use chrono::Utc;
use mongodb::bson::{doc, oid::ObjectId, to_bson, Bson, Document};
use mongodb::error::{TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT};
use mongodb::options::ReturnDocument;
use mongodb::{ClientSession, Collection, Database};
use serde::Serialize;

use crate::errors::{AppError, Result};
use crate::models::money::Money;
use crate::models::payment::{Payment, PaymentStatus};
use crate::models::sms_log::SmsLog;
use crate::models::user::{ActivityEntry, SubscriptionStatus, User, RECENT_ACTIVITY_CAP};

pub const USERS: &str = "users";
pub const PAYMENTS: &str = "payments";
pub const SMS_LOGS: &str = "sms_logs";
pub const ADMINS: &str = "admins";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditStatus {
    pub has_credits: bool,
    pub credits_remaining: i64,
    pub subscription_status: &'static str,
    pub total_sent: i64,
    pub this_month_sent: i64,
}

#[derive(Debug)]
pub struct ApprovalOutcome {
    pub email: String,
    pub amount: Money,
    pub credits_added: i64,
}

#[derive(Debug)]
pub struct RejectionOutcome {
    pub email: String,
    pub amount: Money,
}

/// Creates a new pending payment. Duplicate transaction references are
/// rejected up front so the same transfer cannot queue twice for approval.
pub async fn submit_payment(
    db: &Database,
    email: &str,
    amount: Money,
    txid: &str,
    currency: Option<String>,
) -> Result<ObjectId> {
    let payments: Collection<Payment> = db.collection(PAYMENTS);

    if payments.find_one(doc! { "txid": txid }).await?.is_some() {
        return Err(AppError::DuplicateTransaction);
    }

    let payment = Payment::new(email, amount, txid, currency);
    payments.insert_one(&payment).await?;

    // set by Payment::new, insert_one would have failed on a missing _id
    payment.id.ok_or_else(|| AppError::service("payment id missing after insert"))
}

/// Approves a pending payment and applies its credits, as one atomic unit.
///
/// The status flip is a compare-and-swap on `status: pending` executed inside
/// the transaction, so two admins racing on the same payment resolve to
/// exactly one grant; the loser gets a conflict error. Transient transaction
/// errors retry the whole body, unknown commit results retry the commit, per
/// the driver's transaction contract.
pub async fn approve_payment(
    db: &Database,
    payment_id: ObjectId,
    admin_email: &str,
) -> Result<ApprovalOutcome> {
    let payments: Collection<Payment> = db.collection(PAYMENTS);

    let payment = payments
        .find_one(doc! { "_id": payment_id })
        .await?
        .ok_or(AppError::PaymentNotFound)?;
    payment.status.ensure_approvable()?;

    let credits = payment.amount.credits();
    let mut session = db.client().start_session().await?;

    loop {
        match apply_approval(db, &mut session, payment_id, &payment.email, credits, admin_email)
            .await
        {
            Ok(true) => {
                return Ok(ApprovalOutcome {
                    email: payment.email,
                    amount: payment.amount,
                    credits_added: credits,
                });
            }
            Ok(false) => {
                // lost the race to a concurrent approver; report the precise conflict
                let current = payments
                    .find_one(doc! { "_id": payment_id })
                    .await?
                    .ok_or(AppError::PaymentNotFound)?;
                return Err(current
                    .status
                    .ensure_approvable()
                    .err()
                    .unwrap_or(AppError::AlreadyApproved));
            }
            Err(AppError::MongoDB(e)) if e.contains_label(TRANSIENT_TRANSACTION_ERROR) => {
                tracing::warn!("transient transaction error, retrying approval: {}", e);
                continue;
            }
            Err(e) => return Err(e),
        }
    }
}

/// One transaction attempt. Returns Ok(false) when the payment was no longer
/// pending at commit scope, i.e. someone else won the race.
async fn apply_approval(
    db: &Database,
    session: &mut ClientSession,
    payment_id: ObjectId,
    email: &str,
    credits: i64,
    admin_email: &str,
) -> Result<bool> {
    let payments: Collection<Payment> = db.collection(PAYMENTS);
    let users: Collection<User> = db.collection(USERS);
    let now = bson_now()?;

    session.start_transaction().await?;

    let claimed = match payments
        .find_one_and_update(
            doc! { "_id": payment_id, "status": PaymentStatus::Pending.as_str() },
            doc! { "$set": {
                "status": PaymentStatus::Approved.as_str(),
                "approvedAt": now.clone(),
                "approvedBy": admin_email,
                "updatedAt": now.clone(),
            }},
        )
        .session(&mut *session)
        .await
    {
        Ok(claimed) => claimed,
        Err(e) => {
            let _ = session.abort_transaction().await;
            return Err(e.into());
        }
    };

    if claimed.is_none() {
        session.abort_transaction().await?;
        return Ok(false);
    }

    // The user document may not exist yet; the upsert creates it with the
    // granted balance without clobbering anything a later registration adds.
    let user_update = users
        .update_one(
            doc! { "_id": email },
            doc! {
                "$inc": { "smsCredits": credits },
                "$set": {
                    "subscriptionStatus": "active",
                    "lastPaymentDate": now.clone(),
                    "lastUpdated": now.clone(),
                },
                "$setOnInsert": {
                    "createdAt": now,
                    "totalSent": 0_i64,
                    "thisMonthSent": 0_i64,
                },
            },
        )
        .upsert(true)
        .session(&mut *session)
        .await;

    if let Err(e) = user_update {
        let _ = session.abort_transaction().await;
        return Err(e.into());
    }

    loop {
        match session.commit_transaction().await {
            Ok(()) => return Ok(true),
            Err(e) if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) => {
                tracing::warn!("unknown commit result, retrying commit: {}", e);
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Rejects a pending payment. No credit side effect. The update is filtered on
/// `status: pending` so a rejection can never overwrite a concurrent approval.
pub async fn reject_payment(
    db: &Database,
    payment_id: ObjectId,
    admin_email: &str,
) -> Result<RejectionOutcome> {
    let payments: Collection<Payment> = db.collection(PAYMENTS);

    let payment = payments
        .find_one(doc! { "_id": payment_id })
        .await?
        .ok_or(AppError::PaymentNotFound)?;
    payment.status.ensure_rejectable()?;

    let now = bson_now()?;
    let updated = payments
        .update_one(
            doc! { "_id": payment_id, "status": PaymentStatus::Pending.as_str() },
            doc! { "$set": {
                "status": PaymentStatus::Rejected.as_str(),
                "rejectedAt": now.clone(),
                "rejectedBy": admin_email,
                "updatedAt": now,
            }},
        )
        .await?;

    if updated.matched_count == 0 {
        let current = payments
            .find_one(doc! { "_id": payment_id })
            .await?
            .ok_or(AppError::PaymentNotFound)?;
        return Err(current
            .status
            .ensure_rejectable()
            .err()
            .unwrap_or(AppError::AlreadyRejected));
    }

    Ok(RejectionOutcome {
        email: payment.email,
        amount: payment.amount,
    })
}

/// Removes a payment record regardless of status. Record hygiene only:
/// credits granted by an approved payment are never reversed.
pub async fn delete_payment(db: &Database, payment_id: ObjectId) -> Result<()> {
    let payments: Collection<Payment> = db.collection(PAYMENTS);
    let deleted = payments.delete_one(doc! { "_id": payment_id }).await?;

    if deleted.deleted_count == 0 {
        return Err(AppError::PaymentNotFound);
    }
    Ok(())
}

/// Pure balance read. An absent user simply has no credits.
pub async fn check_credits(db: &Database, user_email: &str) -> Result<CreditStatus> {
    let users: Collection<User> = db.collection(USERS);
    let user = users.find_one(doc! { "_id": user_email }).await?;

    Ok(match user {
        Some(user) => CreditStatus {
            has_credits: user.sms_credits > 0,
            credits_remaining: user.sms_credits,
            subscription_status: match user.subscription_status {
                SubscriptionStatus::Active => "active",
                SubscriptionStatus::Inactive => "inactive",
            },
            total_sent: user.total_sent,
            this_month_sent: user.this_month_sent,
        },
        None => CreditStatus {
            has_credits: false,
            credits_remaining: 0,
            subscription_status: "inactive",
            total_sent: 0,
            this_month_sent: 0,
        },
    })
}

/// Debits one credit after a confirmed send. The filter on `smsCredits >= 1`
/// makes the read-modify-write atomic; the balance cannot go negative no
/// matter how many sends race. Returns the remaining balance.
pub async fn deduct_credit(db: &Database, user_email: &str) -> Result<i64> {
    let users: Collection<User> = db.collection(USERS);
    let now = bson_now()?;

    let updated = users
        .find_one_and_update(
            doc! { "_id": user_email, "smsCredits": { "$gte": 1_i64 } },
            doc! {
                "$inc": { "smsCredits": -1_i64, "totalSent": 1_i64, "thisMonthSent": 1_i64 },
                "$set": { "lastUsed": now.clone(), "lastUpdated": now },
            },
        )
        .return_document(ReturnDocument::After)
        .await?;

    match updated {
        Some(user) => Ok(user.sms_credits),
        None => Err(deduction_failure(
            users.find_one(doc! { "_id": user_email }).await?,
        )),
    }
}

/// Distinguishes a missing user from an empty balance after a conditional
/// deduction found nothing to update.
fn deduction_failure(user: Option<User>) -> AppError {
    match user {
        None => AppError::UserNotFound,
        Some(user) => AppError::InsufficientCredits {
            remaining: user.sms_credits,
        },
    }
}

/// Best-effort audit trail: a row in the global log plus the user's bounded
/// recent-activity list. Callers swallow errors; the send and the deduction
/// have already committed.
pub async fn log_sms_activity(db: &Database, log: SmsLog) -> Result<()> {
    let logs: Collection<SmsLog> = db.collection(SMS_LOGS);
    logs.insert_one(&log).await?;

    let entry = ActivityEntry {
        recipient: log.recipient_phone.clone(),
        timestamp: log.timestamp,
        status: log.status.clone(),
    };

    // Single atomic push; concurrent sends for the same user cannot drop
    // each other's entries the way a read-then-set would.
    let users: Collection<User> = db.collection(USERS);
    users
        .update_one(doc! { "_id": &log.user_email }, activity_push_update(&entry)?)
        .await?;

    Ok(())
}

/// Update document that prepends one entry and trims the list to capacity.
/// `$slice` is applied from the front, so with `$position: 0` the newest
/// entries survive and the oldest fall off.
fn activity_push_update(entry: &ActivityEntry) -> Result<Document> {
    Ok(doc! {
        "$push": {
            "recentActivity": {
                "$each": [to_bson(entry)?],
                "$position": 0_i32,
                "$slice": RECENT_ACTIVITY_CAP as i32,
            }
        }
    })
}

/// Zeroes `thisMonthSent`. Invoked explicitly by an admin (or an external
/// scheduler); this service deliberately ships no cadence of its own.
pub async fn reset_month_counter(db: &Database, user_email: &str) -> Result<()> {
    let users: Collection<User> = db.collection(USERS);
    let updated = users
        .update_one(
            doc! { "_id": user_email },
            doc! { "$set": { "thisMonthSent": 0_i64, "lastUpdated": bson_now()? } },
        )
        .await?;

    if updated.matched_count == 0 {
        return Err(AppError::UserNotFound);
    }
    Ok(())
}

fn bson_now() -> Result<Bson> {
    Ok(to_bson(&Utc::now())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_credits(credits: i64) -> User {
        User {
            email: "a@x.com".to_string(),
            sms_credits: credits,
            subscription_status: SubscriptionStatus::Active,
            total_sent: 0,
            this_month_sent: 0,
            last_used: None,
            last_payment_date: None,
            created_at: None,
            last_updated: None,
            recent_activity: Vec::new(),
            first_name: None,
            last_name: None,
            phone: None,
        }
    }

    #[test]
    fn deduction_miss_on_absent_user_is_not_found() {
        assert!(matches!(deduction_failure(None), AppError::UserNotFound));
    }

    #[test]
    fn deduction_miss_on_empty_balance_reports_remaining() {
        match deduction_failure(Some(user_with_credits(0))) {
            AppError::InsufficientCredits { remaining } => assert_eq!(remaining, 0),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn activity_update_prepends_and_trims_in_one_write() {
        let entry = ActivityEntry {
            recipient: "+15550001".to_string(),
            timestamp: Utc::now(),
            status: "sent".to_string(),
        };

        let update = activity_push_update(&entry).unwrap();
        let push = update
            .get_document("$push")
            .unwrap()
            .get_document("recentActivity")
            .unwrap();

        assert_eq!(push.get_i32("$position").unwrap(), 0);
        assert_eq!(push.get_i32("$slice").unwrap(), RECENT_ACTIVITY_CAP as i32);

        let each = push.get_array("$each").unwrap();
        assert_eq!(each.len(), 1);
        let doc = each[0].as_document().unwrap();
        assert_eq!(doc.get_str("recipient").unwrap(), "+15550001");
        assert_eq!(doc.get_str("status").unwrap(), "sent");
    }

    // Transaction behavior against a real store. These run only when
    // MONGODB_URI points at a replica set (multi-document transactions need
    // one) and are silently skipped otherwise.
    mod store {
        use super::*;
        use mongodb::Client;

        async fn test_db() -> Option<Database> {
            let uri = std::env::var("MONGODB_URI").ok()?;
            let client = Client::with_uri_str(&uri).await.ok()?;
            Some(client.database("sms_credits_test"))
        }

        fn unique_email(prefix: &str) -> String {
            format!("{}-{}@test.local", prefix, ObjectId::new().to_hex())
        }

        fn unique_txid() -> String {
            format!("tx-{}", ObjectId::new().to_hex())
        }

        fn dollars(amount: f64) -> Money {
            Money::from_f64(amount).unwrap()
        }

        #[tokio::test]
        async fn double_approval_grants_credits_once() {
            let Some(db) = test_db().await else { return };
            let email = unique_email("double");
            let id = submit_payment(&db, &email, dollars(20.0), &unique_txid(), None)
                .await
                .unwrap();

            let first = approve_payment(&db, id, "admin@test.local").await.unwrap();
            assert_eq!(first.credits_added, 20);

            let second = approve_payment(&db, id, "admin@test.local").await;
            assert!(matches!(second, Err(AppError::AlreadyApproved)));

            let status = check_credits(&db, &email).await.unwrap();
            assert_eq!(status.credits_remaining, 20);
        }

        #[tokio::test]
        async fn concurrent_approvals_resolve_to_one_grant() {
            let Some(db) = test_db().await else { return };
            let email = unique_email("race");
            let id = submit_payment(&db, &email, dollars(5.0), &unique_txid(), None)
                .await
                .unwrap();

            let (a, b) = tokio::join!(
                approve_payment(&db, id, "one@test.local"),
                approve_payment(&db, id, "two@test.local"),
            );
            assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);

            let status = check_credits(&db, &email).await.unwrap();
            assert_eq!(status.credits_remaining, 5);
        }

        #[tokio::test]
        async fn reject_after_approve_fails_and_keeps_stamps() {
            let Some(db) = test_db().await else { return };
            let email = unique_email("reject");
            let id = submit_payment(&db, &email, dollars(3.0), &unique_txid(), None)
                .await
                .unwrap();
            approve_payment(&db, id, "admin@test.local").await.unwrap();

            let payments: Collection<Payment> = db.collection(PAYMENTS);
            let approved = payments
                .find_one(doc! { "_id": id })
                .await
                .unwrap()
                .unwrap();

            let rejection = reject_payment(&db, id, "admin@test.local").await;
            assert!(matches!(rejection, Err(AppError::CannotRejectApproved)));

            let after = payments
                .find_one(doc! { "_id": id })
                .await
                .unwrap()
                .unwrap();
            assert_eq!(after.status, PaymentStatus::Approved);
            assert_eq!(after.approved_at, approved.approved_at);
            assert!(after.rejected_at.is_none());

            let status = check_credits(&db, &email).await.unwrap();
            assert_eq!(status.credits_remaining, 3);
        }

        #[tokio::test]
        async fn concurrent_approve_and_reject_resolve_to_one_winner() {
            let Some(db) = test_db().await else { return };
            let email = unique_email("contested");
            let id = submit_payment(&db, &email, dollars(7.0), &unique_txid(), None)
                .await
                .unwrap();

            let (approval, rejection) = tokio::join!(
                approve_payment(&db, id, "one@test.local"),
                reject_payment(&db, id, "two@test.local"),
            );
            assert_eq!(approval.is_ok() as u8 + rejection.is_ok() as u8, 1);

            // the balance reflects whichever action claimed the pending status
            let status = check_credits(&db, &email).await.unwrap();
            let expected = if approval.is_ok() { 7 } else { 0 };
            assert_eq!(status.credits_remaining, expected);
        }

        #[tokio::test]
        async fn deleting_an_approved_payment_keeps_the_balance() {
            let Some(db) = test_db().await else { return };
            let email = unique_email("delete");
            let id = submit_payment(&db, &email, dollars(4.99), &unique_txid(), None)
                .await
                .unwrap();
            approve_payment(&db, id, "admin@test.local").await.unwrap();

            delete_payment(&db, id).await.unwrap();
            assert!(matches!(
                delete_payment(&db, id).await,
                Err(AppError::PaymentNotFound)
            ));

            let status = check_credits(&db, &email).await.unwrap();
            assert_eq!(status.credits_remaining, 4);
        }

        #[tokio::test]
        async fn submit_approve_send_walks_the_balance_down() {
            let Some(db) = test_db().await else { return };
            let email = unique_email("flow");
            let id = submit_payment(&db, &email, dollars(20.0), &unique_txid(), None)
                .await
                .unwrap();

            let before = check_credits(&db, &email).await.unwrap();
            assert!(!before.has_credits);

            approve_payment(&db, id, "admin@test.local").await.unwrap();
            let funded = check_credits(&db, &email).await.unwrap();
            assert_eq!(funded.credits_remaining, 20);
            assert_eq!(funded.subscription_status, "active");

            let remaining = deduct_credit(&db, &email).await.unwrap();
            assert_eq!(remaining, 19);

            let after = check_credits(&db, &email).await.unwrap();
            assert_eq!(after.credits_remaining, 19);
            assert_eq!(after.total_sent, 1);
            assert_eq!(after.this_month_sent, 1);
        }

        #[tokio::test]
        async fn deduction_stops_at_zero() {
            let Some(db) = test_db().await else { return };
            let email = unique_email("drain");
            let id = submit_payment(&db, &email, dollars(1.0), &unique_txid(), None)
                .await
                .unwrap();
            approve_payment(&db, id, "admin@test.local").await.unwrap();

            assert_eq!(deduct_credit(&db, &email).await.unwrap(), 0);
            match deduct_credit(&db, &email).await {
                Err(AppError::InsufficientCredits { remaining }) => assert_eq!(remaining, 0),
                other => panic!("unexpected result: {other:?}"),
            }

            let status = check_credits(&db, &email).await.unwrap();
            assert_eq!(status.credits_remaining, 0);
            assert_eq!(status.total_sent, 1);
        }

        #[tokio::test]
        async fn duplicate_txid_is_rejected() {
            let Some(db) = test_db().await else { return };
            let email = unique_email("dup");
            let txid = unique_txid();
            submit_payment(&db, &email, dollars(2.0), &txid, None)
                .await
                .unwrap();

            let second = submit_payment(&db, &email, dollars(2.0), &txid, None).await;
            assert!(matches!(second, Err(AppError::DuplicateTransaction)));
        }

        #[tokio::test]
        async fn activity_list_is_bounded_and_newest_first() {
            let Some(db) = test_db().await else { return };
            let email = unique_email("activity");
            let id = submit_payment(&db, &email, dollars(1.0), &unique_txid(), None)
                .await
                .unwrap();
            approve_payment(&db, id, "admin@test.local").await.unwrap();

            for i in 0..=RECENT_ACTIVITY_CAP {
                let now = Utc::now();
                let log = SmsLog {
                    id: None,
                    user_email: email.clone(),
                    recipient_phone: format!("+1555000{i}"),
                    recipient_name: "Test Recipient".to_string(),
                    event_title: "Test Event".to_string(),
                    status: "sent".to_string(),
                    provider: "twilio".to_string(),
                    timestamp: now,
                    created_at: now,
                };
                log_sms_activity(&db, log).await.unwrap();
            }

            let users: Collection<User> = db.collection(USERS);
            let user = users
                .find_one(doc! { "_id": &email })
                .await
                .unwrap()
                .unwrap();

            assert_eq!(user.recent_activity.len(), RECENT_ACTIVITY_CAP);
            assert_eq!(
                user.recent_activity[0].recipient,
                format!("+1555000{RECENT_ACTIVITY_CAP}")
            );
            assert!(user
                .recent_activity
                .iter()
                .all(|e| e.recipient != "+15550000"));
        }
    }
}
