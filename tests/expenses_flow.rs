#[path = "common/mod.rs"]
mod common;

use chrono::{Datelike, Utc};

use casetrack::models::{PAYMENT_ACTION_PAID, PAYMENT_ACTION_UNDONE, PaymentStatus};
use casetrack::state::{
    ExpenseCreateOutcome, ExpenseInput, RecurringExpenseInput, all_payment_history,
    create_expense, create_recurring_expense, get_expense_by_id, get_recurring_by_id,
    list_expenses, mark_expense_paid, mark_month_paid, payments_for_expense, postpone_month,
    recurring_month_view, undo_expense_paid, undo_month_paid,
};

fn rent() -> RecurringExpenseInput {
    RecurringExpenseInput {
        name: "Office rent".to_string(),
        amount: Some(25_000.0),
        category: "Rent".to_string(),
        location: "Makati".to_string(),
        start_date: "2024-01-01".to_string(),
        day_of_month_due: Some(10),
        is_active: Some(true),
        notes: None,
    }
}

#[tokio::test]
async fn overrides_are_authoritative_and_undo_reverts() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();

    let id = create_recurring_expense(&state, &rent()).await.unwrap();
    let expense = get_recurring_by_id(&state, &id).await.unwrap().unwrap();
    let today = Utc::now().date_naive();

    // A month long past with no override projects as Overdue
    let payments = payments_for_expense(&state, &id).await.unwrap();
    assert_eq!(
        expense.status_for_month(&payments, 2024, 2, today),
        PaymentStatus::Overdue
    );

    // Marking paid writes the override and it wins over the computed rule
    assert!(mark_month_paid(&state, &id, 2024, 2, None, None, None).await.unwrap());
    let payments = payments_for_expense(&state, &id).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Paid);
    assert_eq!(payments[0].amount_paid, Some(25_000.0));
    assert_eq!(
        expense.status_for_month(&payments, 2024, 2, today),
        PaymentStatus::Paid
    );

    // Undo deletes the override; the projection reverts to Overdue
    assert!(undo_month_paid(&state, &id, 2024, 2).await.unwrap());
    let payments = payments_for_expense(&state, &id).await.unwrap();
    assert!(payments.is_empty());
    assert_eq!(
        expense.status_for_month(&payments, 2024, 2, today),
        PaymentStatus::Overdue
    );

    // Undoing again finds nothing
    assert!(!undo_month_paid(&state, &id, 2024, 2).await.unwrap());

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn postponed_months_stay_postponed_until_changed() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();

    let id = create_recurring_expense(&state, &rent()).await.unwrap();
    let expense = get_recurring_by_id(&state, &id).await.unwrap().unwrap();
    let today = Utc::now().date_naive();

    assert!(
        postpone_month(&state, &id, 2024, 3, Some("landlord abroad".to_string()))
            .await
            .unwrap()
    );
    let payments = payments_for_expense(&state, &id).await.unwrap();
    assert_eq!(
        expense.status_for_month(&payments, 2024, 3, today),
        PaymentStatus::Postponed
    );

    // Paying the same month replaces the override in place
    assert!(mark_month_paid(&state, &id, 2024, 3, Some(24_000.0), None, None).await.unwrap());
    let payments = payments_for_expense(&state, &id).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Paid);
    assert_eq!(payments[0].amount_paid, Some(24_000.0));

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn month_view_projects_each_active_expense() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();

    let id = create_recurring_expense(&state, &rent()).await.unwrap();
    let now = Utc::now();

    let rows = recurring_month_view(&state, 2024, 2, None, false).await.unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.id, id.to_hex());
    assert_eq!(row.due_date.day(), 10);
    assert_eq!(row.status, PaymentStatus::Overdue);
    assert!(row.can_mark_as_paid);
    assert!(!row.can_postpone);

    // A future month is Pending and can be postponed
    let future_year = now.year() + 1;
    let rows = recurring_month_view(&state, future_year, 1, None, false).await.unwrap();
    assert_eq!(rows[0].status, PaymentStatus::Pending);
    assert!(rows[0].can_postpone);

    // Status filter keeps only matching rows
    let rows = recurring_month_view(&state, 2024, 2, Some(PaymentStatus::Paid), false)
        .await
        .unwrap();
    assert!(rows.is_empty());

    common::teardown(Some(ctx)).await;
}

fn utilities(due: &str) -> ExpenseInput {
    ExpenseInput {
        name: "Electric bill".to_string(),
        amount: Some(4_200.0),
        due_date: due.to_string(),
        status: Some("Pending".to_string()),
        category: "Utilities".to_string(),
        location: "Makati".to_string(),
        paid_date: None,
        notes: None,
        recurring: false,
        repeat_months: None,
    }
}

#[tokio::test]
async fn one_off_mark_paid_soft_deletes_and_undo_restores() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();

    let outcome = create_expense(&state, &utilities("2025-05-20")).await.unwrap();
    let id = match outcome {
        ExpenseCreateOutcome::Created(id) => id,
        ExpenseCreateOutcome::Restored(_) => panic!("fresh ledger cannot restore"),
    };

    assert!(mark_expense_paid(&state, &id).await.unwrap());
    let expense = get_expense_by_id(&state, &id).await.unwrap().unwrap();
    assert_eq!(expense.status, PaymentStatus::Paid);
    assert!(expense.is_deleted);
    assert!(expense.paid_date.is_some());
    assert_eq!(expense.payment_history.len(), 1);
    assert_eq!(expense.payment_history[0].action, PAYMENT_ACTION_PAID);

    // Hidden from the visible ledger while soft-deleted
    let visible = list_expenses(&state, None, None).await.unwrap();
    assert!(!visible.iter().any(|e| e.id == Some(id)));

    // Paid rows show up in the merged history
    let history = all_payment_history(&state, None).await.unwrap();
    assert!(history.iter().any(|r| r.name == "Electric bill" && r.kind == "Normal"));

    assert!(undo_expense_paid(&state, &id).await.unwrap());
    let expense = get_expense_by_id(&state, &id).await.unwrap().unwrap();
    assert_eq!(expense.status, PaymentStatus::Pending);
    assert!(!expense.is_deleted);
    assert!(expense.paid_date.is_none());
    assert_eq!(expense.payment_history.len(), 2);
    assert_eq!(expense.payment_history[1].action, PAYMENT_ACTION_UNDONE);

    let visible = list_expenses(&state, None, None).await.unwrap();
    assert!(visible.iter().any(|e| e.id == Some(id)));

    common::teardown(Some(ctx)).await;
}

#[tokio::test]
async fn creating_over_a_soft_deleted_twin_restores_it() {
    let ctx = match common::setup_state().await {
        Some(s) => s,
        None => return,
    };
    let state = ctx.state.clone();

    let outcome = create_expense(&state, &utilities("2025-06-20")).await.unwrap();
    let id = match outcome {
        ExpenseCreateOutcome::Created(id) => id,
        ExpenseCreateOutcome::Restored(_) => panic!("fresh ledger cannot restore"),
    };
    assert!(mark_expense_paid(&state, &id).await.unwrap());

    let outcome = create_expense(&state, &utilities("2025-06-20")).await.unwrap();
    match outcome {
        ExpenseCreateOutcome::Restored(restored) => assert_eq!(restored, id),
        ExpenseCreateOutcome::Created(_) => panic!("expected the twin to be restored"),
    }
    let expense = get_expense_by_id(&state, &id).await.unwrap().unwrap();
    assert!(!expense.is_deleted);

    common::teardown(Some(ctx)).await;
}
