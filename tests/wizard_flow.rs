use citypulse_core::capabilities::{StoreError, StoreOperation, StoreOutput};
use citypulse_core::wizard::WizardStep;
use citypulse_core::{App, Effect, Event, Model, ReportDocument};
use crux_core::testing::AppTester;

fn open_wizard_at_city_center(app: &AppTester<App, Effect>, model: &mut Model) {
    let update = app.update(
        Event::WizardOpened {
            lat: 12.9716,
            lng: 77.5946,
        },
        model,
    );
    assert!(update.effects.iter().any(|e| matches!(e, Effect::Render(_))));
    assert!(model.wizard.is_some());
}

fn current_step(model: &Model) -> WizardStep {
    model.wizard.as_ref().unwrap().step()
}

#[test]
fn four_step_report_reaches_the_feed() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    open_wizard_at_city_center(&app, &mut model);
    assert_eq!(current_step(&model), WizardStep::Location);

    // Location was captured at open time, so the first advance is free.
    app.update(Event::StepAdvanceRequested, &mut model);
    assert_eq!(current_step(&model), WizardStep::Description);

    // An empty description blocks progress, silently.
    app.update(Event::StepAdvanceRequested, &mut model);
    assert_eq!(current_step(&model), WizardStep::Description);

    app.update(
        Event::DescriptionEdited {
            text: "Large pothole".into(),
        },
        &mut model,
    );
    app.update(Event::StepAdvanceRequested, &mut model);
    assert_eq!(current_step(&model), WizardStep::Photo);

    // The photo is optional under the four-step policy.
    app.update(Event::StepAdvanceRequested, &mut model);
    assert_eq!(current_step(&model), WizardStep::Confirm);

    // Submit with no photo goes straight to the document insert.
    let update = app.update(Event::SubmitRequested, &mut model);
    let inserts: Vec<_> = update
        .effects
        .iter()
        .filter_map(|e| match e {
            Effect::Store(request) => Some(&request.operation),
            _ => None,
        })
        .collect();
    assert_eq!(inserts.len(), 1);

    let StoreOperation::InsertDocument {
        collection,
        document,
    } = inserts[0]
    else {
        panic!("expected a document insert, got {:?}", inserts[0]);
    };
    assert_eq!(collection, "user_reports");

    let parsed = ReportDocument::parse(document).unwrap();
    assert_eq!(parsed.description, "Large pothole");
    assert!(parsed.image_url.is_none());
    let location = parsed.location.unwrap();
    assert!((location.latitude - 12.9716).abs() < 1e-9);
    assert!((location.longitude - 77.5946).abs() < 1e-9);

    // A second submit while the first is in flight issues nothing.
    let update = app.update(Event::SubmitRequested, &mut model);
    assert!(update.effects.iter().all(|e| !matches!(e, Effect::Store(_))));
    assert!(model.feed.is_empty());

    // Success closes the wizard and prepends exactly one report.
    let update = app.update(
        Event::SubmitResult(Box::new(Ok(StoreOutput::Inserted {
            id: "report-1".into(),
        }))),
        &mut model,
    );

    assert!(model.wizard.is_none());
    assert_eq!(model.feed.len(), 1);

    let head = model.feed.front().unwrap();
    assert_eq!(head.description, "Large pothole");
    assert!(head.photo_url.is_none());
    let location = head.location.unwrap();
    assert!((location.lat() - 12.9716).abs() < 1e-9);
    assert!((location.lng() - 77.5946).abs() < 1e-9);

    // The refreshed feed snapshot is cached for the next start.
    assert!(update.effects.iter().any(|e| matches!(e, Effect::Kv(_))));
}

#[test]
fn cancel_leaves_no_trace_in_the_feed() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    open_wizard_at_city_center(&app, &mut model);
    app.update(Event::StepAdvanceRequested, &mut model);
    app.update(
        Event::DescriptionEdited {
            text: "Signal out at Silk Board".into(),
        },
        &mut model,
    );

    let update = app.update(Event::WizardCancelled, &mut model);

    assert!(model.wizard.is_none());
    assert!(model.feed.is_empty());
    assert!(update.effects.iter().all(|e| !matches!(e, Effect::Store(_))));
}

#[test]
fn failed_submission_keeps_the_draft_for_retry() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    open_wizard_at_city_center(&app, &mut model);
    app.update(Event::StepAdvanceRequested, &mut model);
    app.update(
        Event::DescriptionEdited {
            text: "Waterlogging near Hebbal".into(),
        },
        &mut model,
    );
    app.update(Event::StepAdvanceRequested, &mut model);
    app.update(Event::StepAdvanceRequested, &mut model);

    app.update(Event::SubmitRequested, &mut model);
    app.update(
        Event::SubmitResult(Box::new(Err(StoreError::Timeout))),
        &mut model,
    );

    // Draft intact, still on confirm, nothing in the feed.
    let draft = model.wizard.as_ref().unwrap();
    assert_eq!(draft.step(), WizardStep::Confirm);
    assert_eq!(draft.description(), "Waterlogging near Hebbal");
    assert!(draft.submission().is_failed());
    assert!(model.feed.is_empty());

    // A user-initiated retry goes out again.
    let update = app.update(Event::SubmitRequested, &mut model);
    assert!(update.effects.iter().any(|e| matches!(e, Effect::Store(_))));

    app.update(
        Event::SubmitResult(Box::new(Ok(StoreOutput::Inserted {
            id: "report-2".into(),
        }))),
        &mut model,
    );
    assert!(model.wizard.is_none());
    assert_eq!(model.feed.len(), 1);
}
