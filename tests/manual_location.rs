use citypulse_core::capabilities::{
    GalleryOutput, GeocoderOperation, GeocoderOutput, PlaceSuggestion, StoreOperation, StoreOutput,
    REGION_BIAS,
};
use citypulse_core::wizard::{WizardPolicy, WizardStep};
use citypulse_core::{App, AppConfig, Effect, Event, Model, ReportDocument};
use crux_core::testing::AppTester;

fn tiny_png() -> Vec<u8> {
    use image::{ExtendedColorType, ImageEncoder};
    let pixels = vec![200u8; 8 * 8 * 3];
    let mut buffer = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buffer)
        .write_image(&pixels, 8, 8, ExtendedColorType::Rgb8)
        .unwrap();
    buffer
}

fn three_step_session() -> (AppTester<App, Effect>, Model) {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    app.update(
        Event::ConfigLoaded(Box::new(AppConfig {
            wizard_policy: WizardPolicy::ThreeStep,
            ..AppConfig::default()
        })),
        &mut model,
    );
    app.update(Event::WizardOpenedBlank, &mut model);
    (app, model)
}

fn current_step(model: &Model) -> WizardStep {
    model.wizard.as_ref().unwrap().step()
}

#[test]
fn rapid_typing_yields_one_suggestion_request_for_the_last_query() {
    let (app, mut model) = three_step_session();

    // Under the minimum query length: no debounce timer is even armed.
    let update = app.update(
        Event::ManualLocationEdited { text: "Ko".into() },
        &mut model,
    );
    assert!(update.effects.iter().all(|e| !matches!(e, Effect::Timer(_))));

    let update = app.update(
        Event::ManualLocationEdited { text: "Kor".into() },
        &mut model,
    );
    assert_eq!(
        update
            .effects
            .iter()
            .filter(|e| matches!(e, Effect::Timer(_)))
            .count(),
        1
    );

    let update = app.update(
        Event::ManualLocationEdited { text: "Kora".into() },
        &mut model,
    );
    assert_eq!(
        update
            .effects
            .iter()
            .filter(|e| matches!(e, Effect::Timer(_)))
            .count(),
        1
    );

    let generation = model.wizard.as_ref().unwrap().suggest_generation();

    // The superseded timer fires first; its generation is stale, so no
    // lookup goes out.
    let update = app.update(
        Event::SuggestDebounceElapsed {
            generation: generation - 1,
        },
        &mut model,
    );
    assert!(update
        .effects
        .iter()
        .all(|e| !matches!(e, Effect::Geocoder(_))));

    // The live timer produces exactly one request, for the final text.
    let update = app.update(Event::SuggestDebounceElapsed { generation }, &mut model);
    let requests: Vec<_> = update
        .effects
        .iter()
        .filter_map(|e| match e {
            Effect::Geocoder(request) => Some(request.operation.clone()),
            _ => None,
        })
        .collect();

    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0],
        GeocoderOperation::Suggest {
            query: "Kora".into(),
            region: REGION_BIAS.into(),
        }
    );
}

#[test]
fn three_step_report_with_manual_location_and_mandatory_photo() {
    let (app, mut model) = three_step_session();

    // Type a full query and let the debounce fire.
    app.update(
        Event::ManualLocationEdited {
            text: "MG Road, Bengaluru".into(),
        },
        &mut model,
    );
    let generation = model.wizard.as_ref().unwrap().suggest_generation();
    app.update(Event::SuggestDebounceElapsed { generation }, &mut model);

    app.update(
        Event::SuggestionsReceived {
            generation,
            result: Box::new(Ok(GeocoderOutput::Suggestions(vec![PlaceSuggestion {
                id: "ChIJ-mg-road".into(),
                label: "MG Road, Bengaluru".into(),
            }]))),
        },
        &mut model,
    );
    assert_eq!(model.wizard.as_ref().unwrap().suggestions().len(), 1);

    app.update(Event::SuggestionChosen { index: 0 }, &mut model);
    let draft = model.wizard.as_ref().unwrap();
    assert_eq!(draft.manual_text(), Some("MG Road, Bengaluru"));
    assert!(draft.suggestions().is_empty());

    app.update(Event::StepAdvanceRequested, &mut model);
    assert_eq!(current_step(&model), WizardStep::Details);

    // No photo yet: advancing out of details is refused.
    app.update(Event::StepAdvanceRequested, &mut model);
    assert_eq!(current_step(&model), WizardStep::Details);

    app.update(
        Event::GalleryResult(Box::new(Ok(GalleryOutput::Image {
            data: tiny_png(),
            mime_type: Some("image/png".into()),
        }))),
        &mut model,
    );
    assert!(model.wizard.as_ref().unwrap().photo().is_some());

    app.update(Event::StepAdvanceRequested, &mut model);
    assert_eq!(current_step(&model), WizardStep::Confirm);

    // Description deliberately left blank: optional under this policy.
    let update = app.update(Event::SubmitRequested, &mut model);
    let uploads: Vec<_> = update
        .effects
        .iter()
        .filter_map(|e| match e {
            Effect::Store(request) => Some(request.operation.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(uploads.len(), 1);
    let StoreOperation::UploadBlob { content_type, .. } = &uploads[0] else {
        panic!("expected a blob upload first, got {:?}", uploads[0]);
    };
    assert_eq!(content_type, "image/png");

    // Upload completes; the document insert follows with the photo URL.
    let update = app.update(
        Event::PhotoUploadResult(Box::new(Ok(StoreOutput::BlobStored {
            url: "https://cdn.example/reports/r.png".into(),
        }))),
        &mut model,
    );
    let inserts: Vec<_> = update
        .effects
        .iter()
        .filter_map(|e| match e {
            Effect::Store(request) => Some(request.operation.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(inserts.len(), 1);
    let StoreOperation::InsertDocument { document, .. } = &inserts[0] else {
        panic!("expected a document insert, got {:?}", inserts[0]);
    };

    let parsed = ReportDocument::parse(document).unwrap();
    assert_eq!(parsed.description, "");
    assert_eq!(parsed.location_text.as_deref(), Some("MG Road, Bengaluru"));
    assert!(parsed.location.is_none());
    assert_eq!(
        parsed.image_url.as_deref(),
        Some("https://cdn.example/reports/r.png")
    );

    app.update(
        Event::SubmitResult(Box::new(Ok(StoreOutput::Inserted {
            id: "report-mg-road".into(),
        }))),
        &mut model,
    );

    assert!(model.wizard.is_none());
    let head = model.feed.front().unwrap();
    assert_eq!(head.description, "");
    assert_eq!(
        head.photo_url.as_deref(),
        Some("https://cdn.example/reports/r.png")
    );
    assert!(head.location.is_none());
    assert_eq!(head.location_text.as_deref(), Some("MG Road, Bengaluru"));
}

#[test]
fn unreadable_image_degrades_to_no_attachment() {
    let (app, mut model) = three_step_session();

    app.update(
        Event::ManualLocationEdited {
            text: "Indiranagar".into(),
        },
        &mut model,
    );
    app.update(Event::StepAdvanceRequested, &mut model);
    assert_eq!(current_step(&model), WizardStep::Details);

    app.update(
        Event::GalleryResult(Box::new(Ok(GalleryOutput::Image {
            data: vec![0x00, 0x01, 0x02, 0x03],
            mime_type: Some("image/jpeg".into()),
        }))),
        &mut model,
    );

    // The wizard survives, nothing is attached, the error is surfaced.
    let draft = model.wizard.as_ref().unwrap();
    assert!(draft.photo().is_none());
    assert!(model.active_error.is_some());

    // And the details gate still holds.
    app.update(Event::StepAdvanceRequested, &mut model);
    assert_eq!(current_step(&model), WizardStep::Details);
}

#[test]
fn stale_suggestion_results_are_discarded() {
    let (app, mut model) = three_step_session();

    app.update(
        Event::ManualLocationEdited {
            text: "Koramangala".into(),
        },
        &mut model,
    );
    let old_generation = model.wizard.as_ref().unwrap().suggest_generation();

    // The user keeps typing before the first lookup resolves.
    app.update(
        Event::ManualLocationEdited {
            text: "Koramangala 5th Block".into(),
        },
        &mut model,
    );

    app.update(
        Event::SuggestionsReceived {
            generation: old_generation,
            result: Box::new(Ok(GeocoderOutput::Suggestions(vec![PlaceSuggestion {
                id: "stale".into(),
                label: "Koramangala".into(),
            }]))),
        },
        &mut model,
    );

    assert!(model.wizard.as_ref().unwrap().suggestions().is_empty());
}
