//! Pipeline tests for the chatbot module: routing decisions, dispatcher replies and the
//! full update flow through the engine, with fakes at every external seam.
//!
//! Run with: cargo test chatbot

use std::sync::Arc;

use serde_json::json;
use teloxide::types::{Update, UpdateId, UpdateKind};

use super::capabilities::{MemeReport, Place, PlacesReport};
use super::dispatcher::{decide, Decision, Dispatcher, DispatcherConfig};
use super::engine::{BotEngine, Outcome};
use super::format::image_caption;
use super::message::Media;
use super::registry::{Payload, Registry};
use super::prompts::GENERAL_ERROR_TEXT;
use super::store::{ChatRecord, Database, Location, Store};
use super::testing::*;
use super::whisper::Transcriber;
use crate::intent::{Intent, IntentResult, Parameters};

fn params(pairs: &[(&str, &str)]) -> Parameters {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn extracted(intent: Intent, pairs: &[(&str, &str)]) -> IntentResult {
    IntentResult::new(intent, Some(params(pairs)))
}

fn store() -> Arc<Database> {
    Arc::new(Database::in_memory().unwrap())
}

fn dispatcher(
    extraction: IntentResult,
    model: Arc<ScriptedModel>,
    registry: Registry,
    store: Arc<Database>,
) -> Dispatcher {
    Dispatcher::new(
        DispatcherConfig::default(),
        Arc::new(FixedExtractor(extraction)),
        model,
        Arc::new(registry),
        store,
    )
}

fn cafes(count: usize, page: usize) -> PlacesReport {
    PlacesReport {
        query: "cafes".into(),
        places: (1..=count)
            .map(|i| Place {
                name: format!("Cafe {i}"),
                address: format!("{i} Hill Road"),
                rating: Some(4.0),
                user_ratings_total: Some(10),
                price_level: None,
                open_now: None,
                distance_m: 100.0 * i as f64,
            })
            .collect(),
        page,
        radius_m: 5000,
    }
}

// =============================================================================
// ROUTING DECISIONS
// =============================================================================

mod routing {
    use super::*;

    fn here() -> Location {
        Location { lat: 19.07, lon: 72.87, timestamp: String::new() }
    }

    #[test]
    fn test_weather_call_uses_handler_argument_names() {
        match decide(Intent::Weather, Some(&params(&[("city", "Mumbai")])), None) {
            Decision::DirectCall { spec, args } => {
                assert_eq!(spec.function_name, "get_weather");
                assert_eq!(args.get("city_name").map(String::as_str), Some("Mumbai"));
            }
            other => panic!("expected a direct call, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_required_param_asks() {
        let decision = decide(Intent::Weather, Some(&params(&[("country", "IN")])), None);
        assert!(matches!(decision, Decision::Clarify(spec) if spec.intent == Intent::Weather));
    }

    #[test]
    fn test_no_params_asks() {
        assert!(matches!(decide(Intent::Stock, None, None), Decision::Clarify(_)));
        assert!(matches!(decide(Intent::Meme, None, None), Decision::Clarify(_)));
    }

    #[test]
    fn test_places_without_location_requests_it() {
        let decision = decide(Intent::Places, Some(&params(&[("query", "cafes")])), None);
        assert!(matches!(decision, Decision::RequestLocation));
        assert!(matches!(decide(Intent::Places, None, None), Decision::RequestLocation));
    }

    #[test]
    fn test_places_falls_back_to_stored_location() {
        match decide(Intent::Places, None, Some(&here())) {
            Decision::DirectCall { args, .. } => {
                assert_eq!(args.get("lat").map(String::as_str), Some("19.07"));
                assert_eq!(args.get("lon").map(String::as_str), Some("72.87"));
                assert_eq!(args.get("query").map(String::as_str), Some("restaurants"));
            }
            other => panic!("expected a direct call, got {other:?}"),
        }
    }

    #[test]
    fn test_explicit_coordinates_win_over_stored() {
        let given = params(&[("lat", "12.97"), ("lon", "77.59"), ("query", "bars")]);
        match decide(Intent::Places, Some(&given), Some(&here())) {
            Decision::DirectCall { args, .. } => {
                assert_eq!(args.get("lat").map(String::as_str), Some("12.97"));
                assert_eq!(args.get("query").map(String::as_str), Some("bars"));
            }
            other => panic!("expected a direct call, got {other:?}"),
        }
    }

    #[test]
    fn test_general_falls_back() {
        assert!(matches!(decide(Intent::General, None, None), Decision::Fallback));
    }
}

// =============================================================================
// DISPATCHER REPLIES
// =============================================================================

mod dispatcher_replies {
    use super::*;

    #[tokio::test]
    async fn test_greeting_short_circuits() {
        let model = Arc::new(ScriptedModel::failing());
        let d = dispatcher(IntentResult::none(), model.clone(), Registry::new(), store());

        let reply = d.respond("Hello!", Some(1)).await;
        assert_eq!(reply.message_type, "greeting");
        assert_eq!(reply.function_used.as_deref(), Some("greeting"));
        assert!(matches!(reply.media.as_slice(), [Media::File { .. }]));
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_weather_is_sent_verbatim() {
        let weather = Arc::new(FakeCapability::text("🌤️ Weather in Mumbai, IN: 29°C"));
        let mut registry = Registry::new();
        registry.register(Intent::Weather, weather.clone());
        let model = Arc::new(ScriptedModel::failing());
        let d = dispatcher(extracted(Intent::Weather, &[("city", "Mumbai")]), model.clone(), registry, store());

        let reply = d.respond("what's the weather in Mumbai", Some(1)).await;
        assert_eq!(reply.text, "🌤️ Weather in Mumbai, IN: 29°C");
        assert_eq!(reply.function_used.as_deref(), Some("get_weather"));
        assert!(reply.success);

        let calls = weather.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].get("city_name").map(String::as_str), Some("Mumbai"));
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_stock_is_rephrased() {
        let mut registry = Registry::new();
        registry.register(Intent::Stock, Arc::new(FakeCapability::text("📊 Apple Inc. (AAPL)\n💰 Current: $190.12")));
        let model = Arc::new(ScriptedModel::new(["Apple is trading at about $190 right now."]));
        let d = dispatcher(extracted(Intent::Stock, &[("symbol", "AAPL")]), model.clone(), registry, store());

        let reply = d.respond("how is apple stock doing", Some(1)).await;
        assert_eq!(reply.text, "Apple is trading at about $190 right now.");
        assert_eq!(reply.message_type, "get_stock_price");

        let prompt = &model.prompts()[0];
        assert!(prompt.contains("get_stock_price"));
        assert!(prompt.contains("Current: $190.12"));
    }

    #[tokio::test]
    async fn test_rephrase_failure_sends_raw_result() {
        let mut registry = Registry::new();
        registry.register(Intent::News, Arc::new(FakeCapability::text("📰 Headlines: ...")));
        let d = dispatcher(
            extracted(Intent::News, &[("query", "latest")]),
            Arc::new(ScriptedModel::failing()),
            registry,
            store(),
        );

        let reply = d.respond("latest news", None).await;
        assert_eq!(reply.text, "📰 Headlines: ...");
        assert!(reply.success);
    }

    #[tokio::test]
    async fn test_handler_failure_is_a_generic_apology() {
        let mut registry = Registry::new();
        registry.register(Intent::News, Arc::new(FakeCapability::failing("429 rate limited")));
        let d = dispatcher(
            extracted(Intent::News, &[("query", "cricket")]),
            Arc::new(ScriptedModel::failing()),
            registry,
            store(),
        );

        let reply = d.respond("cricket news", None).await;
        assert!(!reply.success);
        assert!(reply.text.contains("news service"));
        assert!(!reply.text.contains("429"));
        assert_eq!(reply.function_used.as_deref(), Some("get_news"));
    }

    #[tokio::test]
    async fn test_unregistered_handler_is_a_failure() {
        let d = dispatcher(
            extracted(Intent::Weather, &[("city", "Pune")]),
            Arc::new(ScriptedModel::failing()),
            Registry::new(),
            store(),
        );

        let reply = d.respond("weather in Pune", None).await;
        assert!(!reply.success);
        assert!(reply.text.contains("weather service"));
    }

    #[tokio::test]
    async fn test_places_without_location_asks_for_it() {
        let places = Arc::new(FakeCapability::payload(Payload::Places(cafes(3, 0))));
        let mut registry = Registry::new();
        registry.register(Intent::Places, places.clone());
        let d = dispatcher(
            IntentResult::new(Intent::Places, Some(Parameters::new())),
            Arc::new(ScriptedModel::failing()),
            registry,
            store(),
        );

        let reply = d.respond("restaurants near me", Some(7)).await;
        assert!(reply.request_location);
        assert_eq!(reply.message_type, "location_request");
        assert!(places.calls().is_empty());
    }

    #[tokio::test]
    async fn test_places_uses_stored_location_and_page() {
        let db = store();
        db.upsert_user(7, "Asha", None);
        db.set_location(7, 19.07, 72.87);

        let places = Arc::new(FakeCapability::payload(Payload::Places(cafes(7, 1))));
        let mut registry = Registry::new();
        registry.register(Intent::Places, places.clone());
        let d = dispatcher(
            extracted(Intent::Places, &[("query", "cafes"), ("page", "2")]),
            Arc::new(ScriptedModel::failing()),
            registry,
            db,
        );

        let reply = d.respond("show me page 2 of cafes", Some(7)).await;
        assert!(reply.text.contains("6. Cafe 6"));
        assert!(reply.text.contains("Page 2 of 2"));
        assert!(!reply.text.contains("More available"));

        let args = &places.calls()[0];
        assert_eq!(args.get("lat").map(String::as_str), Some("19.07"));
        assert_eq!(args.get("page").map(String::as_str), Some("2"));
        assert_eq!(args.get("query").map(String::as_str), Some("cafes"));
    }

    #[tokio::test]
    async fn test_meme_keywords_beat_image_keywords() {
        let image = Arc::new(FakeCapability::text("unused"));
        let meme = Arc::new(FakeCapability::text("unused"));
        let mut registry = Registry::new();
        registry.register(Intent::Image, image.clone());
        registry.register(Intent::Meme, meme.clone());
        let model = Arc::new(ScriptedModel::new(["What should the meme say? 😄"]));
        let d = dispatcher(IntentResult::none(), model.clone(), registry, store());

        let reply = d.respond("generate a meme about mondays", Some(1)).await;
        assert_eq!(reply.text, "What should the meme say? 😄");
        assert!(model.prompts()[0].contains("asking about meme"));
        assert!(image.calls().is_empty());
        assert!(meme.calls().is_empty());
    }

    #[tokio::test]
    async fn test_clarification_falls_back_to_canned_question() {
        let d = dispatcher(
            IntentResult::new(Intent::Stock, None),
            Arc::new(ScriptedModel::failing()),
            Registry::new(),
            store(),
        );

        let reply = d.respond("how are stocks doing", None).await;
        assert!(reply.text.contains("stock symbol"));
        assert!(reply.function_used.is_none());
    }

    #[tokio::test]
    async fn test_image_bytes_become_media() {
        let mut registry = Registry::new();
        registry.register(
            Intent::Image,
            Arc::new(FakeCapability::payload(Payload::Image { bytes: vec![1, 2, 3], prompt: "a red fox".into() })),
        );
        let d = dispatcher(
            extracted(Intent::Image, &[("prompt", "a red fox")]),
            Arc::new(ScriptedModel::failing()),
            registry,
            store(),
        );

        let reply = d.respond("draw a red fox", None).await;
        assert!(reply.text.contains("a red fox"));
        assert_eq!(
            reply.media,
            vec![Media::Bytes { data: vec![1, 2, 3], caption: Some(image_caption("a red fox")) }]
        );
    }

    #[tokio::test]
    async fn test_meme_url_becomes_media() {
        let report = MemeReport {
            url: "https://i.imgflip.com/abc.jpg".into(),
            page_url: "https://imgflip.com/i/abc".into(),
            template_name: "Two Buttons".into(),
            top_text: "Monday".into(),
            bottom_text: String::new(),
        };
        let mut registry = Registry::new();
        registry.register(Intent::Meme, Arc::new(FakeCapability::payload(Payload::Meme(report))));
        let d = dispatcher(
            extracted(Intent::Meme, &[("top_text", "Monday")]),
            Arc::new(ScriptedModel::failing()),
            registry,
            store(),
        );

        let reply = d.respond("meme with Monday on top", None).await;
        assert!(reply.text.contains("Template: Two Buttons"));
        assert!(matches!(&reply.media[..], [Media::Url { url, .. }] if url == "https://i.imgflip.com/abc.jpg"));
    }

    #[tokio::test]
    async fn test_general_conversation_includes_history() {
        let db = store();
        db.upsert_user(7, "Asha", None);
        db.append_chat(&ChatRecord::now(7, "I love biryani", "Great choice!", "general", None));

        let model = Arc::new(ScriptedModel::new(["You mentioned biryani earlier!"]));
        let d = dispatcher(IntentResult::none(), model.clone(), Registry::new(), db);

        let reply = d.respond("what do I like to eat?", Some(7)).await;
        assert_eq!(reply.text, "You mentioned biryani earlier!");
        assert_eq!(reply.message_type, "general");

        let prompt = &model.prompts()[0];
        assert!(prompt.contains("User: Asha (Messages: 1)"));
        assert!(prompt.contains("I love biryani"));
        assert!(prompt.ends_with("Current message: what do I like to eat?"));
    }

    #[tokio::test]
    async fn test_general_model_failure() {
        let d = dispatcher(IntentResult::none(), Arc::new(ScriptedModel::failing()), Registry::new(), store());
        let reply = d.respond("tell me a story", None).await;
        assert!(!reply.success);
        assert_eq!(reply.text, GENERAL_ERROR_TEXT);
    }
}

// =============================================================================
// ENGINE (FULL UPDATE FLOW)
// =============================================================================

mod engine_flow {
    use super::*;

    const CHAT: i64 = 42;
    const USER: i64 = 7;

    fn update(message_id: i64, body: serde_json::Value) -> Update {
        let mut message = json!({
            "message_id": message_id,
            "date": 1_700_000_000,
            "chat": {"id": CHAT, "type": "private", "first_name": "Asha"},
            "from": {"id": USER, "is_bot": false, "first_name": "Asha", "username": "asha"},
        });
        if let (Some(m), Some(b)) = (message.as_object_mut(), body.as_object()) {
            m.extend(b.clone());
        }
        serde_json::from_value(json!({"update_id": message_id, "message": message})).unwrap()
    }

    fn text(message_id: i64, text: &str) -> Update {
        update(message_id, json!({"text": text}))
    }

    struct Harness {
        engine: BotEngine,
        messenger: Arc<RecordingMessenger>,
        store: Arc<Database>,
    }

    fn harness(
        extraction: IntentResult,
        model: ScriptedModel,
        registry: Registry,
        messenger: RecordingMessenger,
        transcriber: Option<Arc<dyn Transcriber>>,
    ) -> Harness {
        let db = store();
        // Known user, so the first-contact welcome stays out of the way.
        db.upsert_user(USER, "Asha", Some("asha"));
        let messenger = Arc::new(messenger);
        let d = dispatcher(extraction, Arc::new(model), registry, db.clone());
        let engine = BotEngine::new(d, db.clone(), messenger.clone(), transcriber);
        Harness { engine, messenger, store: db }
    }

    fn weather_registry() -> Registry {
        let mut registry = Registry::new();
        registry.register(Intent::Weather, Arc::new(FakeCapability::text("🌤️ 29°C in Mumbai")));
        registry
    }

    #[tokio::test]
    async fn test_text_message_round_trip() {
        let h = harness(
            extracted(Intent::Weather, &[("city", "Mumbai")]),
            ScriptedModel::failing(),
            weather_registry(),
            RecordingMessenger::default(),
            None,
        );

        assert_eq!(h.engine.handle_update(text(1, "weather in Mumbai")).await, Outcome::Processed);
        assert_eq!(
            h.messenger.sent(),
            vec![Sent::Text { chat_id: CHAT, text: "🌤️ 29°C in Mumbai".into() }]
        );

        let history = h.store.get_recent_chats(USER, 10);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].user_message, "weather in Mumbai");
        assert_eq!(history[0].message_type, "get_weather");
        assert_eq!(history[0].function_used.as_deref(), Some("get_weather"));
        assert!(h.store.is_processed(CHAT, 1));
    }

    #[tokio::test]
    async fn test_redelivery_is_idempotent() {
        let h = harness(
            extracted(Intent::Weather, &[("city", "Mumbai")]),
            ScriptedModel::failing(),
            weather_registry(),
            RecordingMessenger::default(),
            None,
        );

        assert_eq!(h.engine.handle_update(text(5, "weather in Mumbai")).await, Outcome::Processed);
        assert_eq!(h.engine.handle_update(text(5, "weather in Mumbai")).await, Outcome::Duplicate);

        assert_eq!(h.messenger.sent().len(), 1);
        assert_eq!(h.store.get_recent_chats(USER, 10).len(), 1);
        assert_eq!(h.store.get_user(USER).unwrap().total_messages, 1);
    }

    #[tokio::test]
    async fn test_first_contact_gets_welcome() {
        let db = store();
        let messenger = Arc::new(RecordingMessenger::default());
        let d = dispatcher(
            IntentResult::none(),
            Arc::new(ScriptedModel::new(["Nice to meet you!"])),
            Registry::new(),
            db.clone(),
        );
        let engine = BotEngine::new(d, db.clone(), messenger.clone(), None);

        engine.handle_update(text(1, "who are you")).await;

        let texts = messenger.texts();
        assert_eq!(texts.len(), 2);
        assert!(texts[0].starts_with("🎉 Welcome Asha!"));
        assert_eq!(texts[1], "Nice to meet you!");
        assert!(messenger.sent().iter().any(|s| matches!(s, Sent::Media { media: Media::File { .. }, .. })));
        assert_eq!(db.get_user(USER).unwrap().username.as_deref(), Some("asha"));
    }

    #[tokio::test]
    async fn test_location_message_is_stored() {
        let h = harness(
            IntentResult::none(),
            ScriptedModel::failing(),
            Registry::new(),
            RecordingMessenger::default(),
            None,
        );

        let loc = update(3, json!({"location": {"latitude": 19.07, "longitude": 72.87}}));
        assert_eq!(h.engine.handle_update(loc).await, Outcome::Processed);

        let stored = h.store.get_user(USER).unwrap().last_location.unwrap();
        assert_eq!((stored.lat, stored.lon), (19.07, 72.87));
        assert!(h.messenger.texts()[0].contains("Got your location"));
        assert_eq!(h.store.get_recent_chats(USER, 1)[0].message_type, "location");
    }

    #[tokio::test]
    async fn test_places_request_sends_location_keyboard() {
        let h = harness(
            IntentResult::new(Intent::Places, None),
            ScriptedModel::failing(),
            Registry::new(),
            RecordingMessenger::default(),
            None,
        );

        h.engine.handle_update(text(4, "restaurants near me")).await;
        assert!(matches!(h.messenger.sent().as_slice(), [Sent::LocationRequest { chat_id: CHAT, .. }]));
        assert_eq!(h.store.get_recent_chats(USER, 1)[0].message_type, "location_request");
    }

    #[tokio::test]
    async fn test_voice_is_transcribed_and_dispatched() {
        let transcriber: Arc<dyn Transcriber> = Arc::new(FakeTranscriber(Ok("weather in Mumbai".into())));
        let h = harness(
            extracted(Intent::Weather, &[("city", "Mumbai")]),
            ScriptedModel::failing(),
            weather_registry(),
            RecordingMessenger::with_audio(b"OggS"),
            Some(transcriber),
        );

        let voice = update(6, json!({"voice": {"file_id": "voice-1", "file_unique_id": "voice-1-u", "duration": 2}}));
        assert_eq!(h.engine.handle_update(voice).await, Outcome::Processed);

        assert_eq!(
            h.messenger.texts(),
            vec!["🎤 I heard: \"weather in Mumbai\"".to_string(), "🌤️ 29°C in Mumbai".to_string()]
        );
        assert_eq!(h.store.get_recent_chats(USER, 1)[0].user_message, "weather in Mumbai");
    }

    #[tokio::test]
    async fn test_voice_failure_is_recorded() {
        let transcriber: Arc<dyn Transcriber> = Arc::new(FakeTranscriber(Err("No speech detected".into())));
        let h = harness(
            IntentResult::none(),
            ScriptedModel::failing(),
            Registry::new(),
            RecordingMessenger::with_audio(b"OggS"),
            Some(transcriber),
        );

        h.engine.handle_update(update(8, json!({"voice": {"file_id": "v", "file_unique_id": "v-u", "duration": 1}}))).await;
        assert!(h.messenger.texts()[0].contains("couldn't understand"));
        assert_eq!(h.store.get_recent_chats(USER, 1)[0].message_type, "voice_error");
    }

    #[tokio::test]
    async fn test_voice_without_transcriber() {
        let h = harness(
            IntentResult::none(),
            ScriptedModel::failing(),
            Registry::new(),
            RecordingMessenger::with_audio(b"OggS"),
            None,
        );

        h.engine.handle_update(update(9, json!({"voice": {"file_id": "v", "file_unique_id": "v-u", "duration": 1}}))).await;
        assert!(h.messenger.texts()[0].contains("type it out"));
        assert_eq!(h.store.get_recent_chats(USER, 1)[0].message_type, "voice_error");
    }

    #[tokio::test]
    async fn test_media_failure_still_records() {
        let mut registry = Registry::new();
        registry.register(
            Intent::Image,
            Arc::new(FakeCapability::payload(Payload::Image { bytes: vec![0; 4], prompt: "a cat".into() })),
        );
        let h = harness(
            extracted(Intent::Image, &[("prompt", "a cat")]),
            ScriptedModel::failing(),
            registry,
            RecordingMessenger::failing_media(),
            None,
        );

        assert_eq!(h.engine.handle_update(text(10, "draw a cat")).await, Outcome::Processed);
        assert_eq!(h.messenger.texts().len(), 1);
        assert!(h.store.is_processed(CHAT, 10));
    }

    #[tokio::test]
    async fn test_unsupported_and_empty_updates_are_ignored() {
        let h = harness(
            IntentResult::none(),
            ScriptedModel::failing(),
            Registry::new(),
            RecordingMessenger::default(),
            None,
        );

        let sticker = update(
            11,
            json!({"sticker": {
                "file_id": "s", "file_unique_id": "s-u", "type": "regular",
                "width": 512, "height": 512, "is_animated": false, "is_video": false
            }}),
        );
        assert_eq!(h.engine.handle_update(sticker).await, Outcome::Ignored);
        assert!(!h.store.is_processed(CHAT, 11));

        let empty = Update { id: UpdateId(12), kind: UpdateKind::Error(json!({})) };
        assert_eq!(h.engine.handle_update(empty).await, Outcome::Ignored);
        assert!(h.messenger.sent().is_empty());
    }
}
