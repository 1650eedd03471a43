pub mod common;

use helpdesk::{
    api::{
        self,
        ticket::{Edit, Priority, Status, Type},
        FileRef,
    },
    db::activity::{Kind, Metadata},
    diff::Change,
    directory,
    service::{Entity, Error, Validation},
    transition::{self, InvalidTransition},
    Caller,
};
use serde_json::json;

use self::common::{agent, Fixture, Harness};

#[tokio::test]
async fn status_changes_follow_state_machine() {
    let harness = Harness::new().await;

    for from in Status::ALL {
        for to in Status::ALL {
            let ticket = harness.ticket_in(from).await;
            let before = harness.activities(ticket.id).await.len();

            let result = harness
                .service
                .update(
                    &agent(),
                    ticket.id,
                    Edit {
                        status: Some(to),
                        ..Edit::default()
                    },
                )
                .await;

            if from == to {
                let updated = result.unwrap();
                assert_eq!(updated.ticket.status, from);
                assert!(updated.activity.is_none(), "{from} -> {to}");
            } else if transition::can_transition(from, to) {
                let updated = result.unwrap();
                assert_eq!(updated.ticket.status, to);
                let activity = updated.activity.unwrap();
                assert_eq!(activity.kind, Kind::StatusChanged);
                assert_eq!(activity.description, format!("Status changed to {to}"));
            } else {
                let err = result.unwrap_err();
                assert!(
                    matches!(
                        err,
                        Error::Validation(Validation::InvalidTransition(
                            InvalidTransition { from: f, to: t },
                        )) if f == from && t == to,
                    ),
                    "{from} -> {to}: {err}",
                );
                let current = harness
                    .service
                    .find_one_by_id(&agent(), ticket.id)
                    .await
                    .unwrap();
                assert_eq!(current.ticket.status, from);
            }

            let after = harness.activities(ticket.id).await.len();
            let expected = usize::from(from != to && transition::can_transition(from, to));
            assert_eq!(after - before, expected, "{from} -> {to}");
        }
    }
}

#[tokio::test]
async fn invalid_transition_leaves_other_fields_untouched() {
    let harness = Harness::new().await;
    let ticket = harness.ticket_in(Status::Closed).await;

    let err = harness
        .service
        .update(
            &agent(),
            ticket.id,
            Edit {
                subject: Some("New subject".into()),
                status: Some(Status::InProgress),
                ..Edit::default()
            },
        )
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "cannot move ticket from CLOSED to IN_PROGRESS",
    );
    let current = harness
        .service
        .find_one_by_id(&agent(), ticket.id)
        .await
        .unwrap();
    assert_eq!(current.ticket.subject, "Subject");
}

#[tokio::test]
async fn identical_values_are_a_no_op() {
    let harness = Harness::new().await;
    let ticket = harness.open_ticket(Type::SiteIssue).await;

    let updated = harness
        .service
        .update(
            &agent(),
            ticket.id,
            Edit {
                subject: Some("Subject".into()),
                priority: Some(Priority::High),
                status: Some(Status::Open),
                ..Edit::default()
            },
        )
        .await
        .unwrap();

    assert!(updated.activity.is_none());
    assert_eq!(updated.ticket, ticket);
    assert_eq!(harness.activities(ticket.id).await.len(), 1);
}

#[tokio::test]
async fn status_headlines_over_other_changes() {
    let harness = Harness::new().await;
    let ticket = harness.open_ticket(Type::SiteIssue).await;

    let updated = harness
        .service
        .update(
            &agent(),
            ticket.id,
            Edit {
                subject: Some("Checkout broken".into()),
                status: Some(Status::InProgress),
                priority: Some(Priority::Urgent),
                ..Edit::default()
            },
        )
        .await
        .unwrap();

    let activity = updated.activity.unwrap();
    assert_eq!(activity.kind, Kind::StatusChanged);
    let Metadata::StatusChanged { changes } = &activity.metadata else {
        panic!("unexpected metadata: {:?}", activity.metadata);
    };
    assert_eq!(
        changes.keys().map(String::as_str).collect::<Vec<_>>(),
        ["priority", "status", "subject"],
    );
    assert_eq!(
        changes["status"],
        Change {
            from: json!("OPEN"),
            to: json!("IN_PROGRESS"),
        },
    );
    assert_eq!(updated.ticket.subject, "Checkout broken");
    assert_eq!(updated.ticket.priority, Priority::Urgent);
    assert_eq!(harness.activities(ticket.id).await.len(), 2);
}

#[tokio::test]
async fn priority_headlines_over_assignee() {
    let harness = Harness::new().await;
    let ticket = harness.open_ticket(Type::SiteIssue).await;

    let updated = harness
        .service
        .update(
            &agent(),
            ticket.id,
            Edit {
                priority: Some(Priority::Low),
                assignee_id: Some("bob".into()),
                ..Edit::default()
            },
        )
        .await
        .unwrap();

    let activity = updated.activity.unwrap();
    assert_eq!(activity.kind, Kind::PriorityChanged);
    assert_eq!(activity.description, "Priority changed to LOW");
    assert!(activity.metadata.changes().unwrap().contains_key("assignee"));
}

#[tokio::test]
async fn assigning_records_assignee_snapshot() {
    let harness = Harness::new().await;
    let ticket = harness.open_ticket(Type::SiteIssue).await;

    let updated = harness
        .service
        .update(
            &agent(),
            ticket.id,
            Edit {
                assignee_id: Some("bob".into()),
                ..Edit::default()
            },
        )
        .await
        .unwrap();

    let bob = harness.user("bob").await;
    assert_eq!(updated.ticket.assignee, Some(bob.snapshot()));
    let activity = updated.activity.unwrap();
    assert_eq!(activity.kind, Kind::TicketAssigned);
    assert_eq!(activity.description, "Ticket assigned to bob");
    assert!(matches!(activity.metadata, Metadata::AssigneeChanged { .. }));

    let again = harness
        .service
        .update(
            &agent(),
            ticket.id,
            Edit {
                assignee_id: Some("bob".into()),
                ..Edit::default()
            },
        )
        .await
        .unwrap();
    assert!(again.activity.is_none());
}

#[tokio::test]
async fn generic_update_lists_changed_fields() {
    let harness = Harness::new().await;
    let ticket = harness.open_ticket(Type::SiteIssue).await;

    let updated = harness
        .service
        .update(
            &agent(),
            ticket.id,
            Edit {
                subject: Some("A".into()),
                message: Some("B".into()),
                ticket_type: Some(Type::Branding),
                ..Edit::default()
            },
        )
        .await
        .unwrap();

    let activity = updated.activity.unwrap();
    assert_eq!(activity.kind, Kind::TicketUpdated);
    assert_eq!(
        activity.description,
        "Ticket #SI-000001 updated: message, subject, ticketType",
    );
    // The number is assigned once and never follows the type.
    assert_eq!(updated.ticket.ticket_number, ticket.ticket_number);
    assert_eq!(updated.ticket.ticket_type, Type::Branding);
}

#[tokio::test]
async fn attached_files_are_counted_in_changes() {
    let harness = Fixture::new().failing_files(&["bad.txt"]).build().await;
    let ticket = harness.open_ticket(Type::SiteIssue).await;

    let file = |url: &str| FileRef {
        url: url.into(),
        file_type: "text/plain".into(),
    };
    let updated = harness
        .service
        .update(
            &agent(),
            ticket.id,
            Edit {
                files: vec![file("a.txt"), file("bad.txt"), file("b.txt")],
                ..Edit::default()
            },
        )
        .await
        .unwrap();

    let activity = updated.activity.unwrap();
    assert_eq!(activity.kind, Kind::TicketUpdated);
    assert_eq!(
        activity.metadata.changes().unwrap()["files"],
        Change {
            from: json!(0),
            to: json!(2),
        },
    );
}

#[tokio::test]
async fn failed_write_attaches_no_files() {
    let harness = Fixture::new().failing_ticket_writes().build().await;
    let ticket = harness.open_ticket(Type::SiteIssue).await;

    let err = harness
        .service
        .update(
            &agent(),
            ticket.id,
            Edit {
                subject: Some("Renamed".into()),
                files: vec![FileRef {
                    url: "orphan.txt".into(),
                    file_type: "text/plain".into(),
                }],
                ..Edit::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Store(_)));

    let current = harness
        .service
        .find_one_by_id(&agent(), ticket.id)
        .await
        .unwrap();
    assert_eq!(current.ticket.subject, "Subject");
    assert!(current.files.items.is_empty());
    assert_eq!(harness.activities(ticket.id).await.len(), 1);
}

#[tokio::test]
async fn failed_audit_still_applies_update() {
    let harness = Fixture::new().failing_activities().build().await;
    let ticket = harness.open_ticket(Type::SiteIssue).await;

    let updated = harness
        .service
        .update(
            &agent(),
            ticket.id,
            Edit {
                status: Some(Status::Pending),
                ..Edit::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.ticket.status, Status::Pending);
    assert!(updated.activity.is_none());
    let current = harness
        .service
        .find_one_by_id(&agent(), ticket.id)
        .await
        .unwrap();
    assert_eq!(current.ticket.status, Status::Pending);
}

#[tokio::test]
async fn unresolvable_assignee_aborts_update() {
    let harness = Fixture::new().refusing(&["ghost"]).build().await;
    let ticket = harness.open_ticket(Type::SiteIssue).await;

    let err = harness
        .service
        .update(
            &agent(),
            ticket.id,
            Edit {
                subject: Some("changed".into()),
                assignee_id: Some("ghost".into()),
                ..Edit::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Dependency(directory::Error::NotFound(_)),
    ));
    let current = harness
        .service
        .find_one_by_id(&agent(), ticket.id)
        .await
        .unwrap();
    assert_eq!(current.ticket.subject, "Subject");
    assert_eq!(harness.activities(ticket.id).await.len(), 1);
}

#[tokio::test]
async fn blank_assignee_is_malformed() {
    let harness = Harness::new().await;
    let ticket = harness.open_ticket(Type::SiteIssue).await;

    let err = harness
        .service
        .update(
            &agent(),
            ticket.id,
            Edit {
                assignee_id: Some(String::new()),
                ..Edit::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Validation(Validation::MalformedAssignee),
    ));
}

#[tokio::test]
async fn anonymous_update_is_rejected() {
    let harness = Harness::new().await;
    let ticket = harness.open_ticket(Type::SiteIssue).await;

    let err = harness
        .service
        .update(
            &Caller::anonymous(),
            ticket.id,
            Edit {
                subject: Some("x".into()),
                ..Edit::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Unauthenticated));
}

#[tokio::test]
async fn unknown_ticket_is_not_found() {
    let harness = Harness::new().await;

    let err = harness
        .service
        .update(&agent(), api::ticket::Id::new(), Edit::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotFound(Entity::Ticket)));
}
