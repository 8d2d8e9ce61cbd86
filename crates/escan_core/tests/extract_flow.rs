use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use escan_core::{
    Access, CoreError, DocumentKind, DocumentStore, ExtractionFlow, ExtractionOutcome,
    ExtractionRequest, ImageSource, ImageStore, LanguageModel, Library, LocalAuthBackend,
    MemoryPreferences, PreferenceStore, RecognitionError, Recognizer, RemainingUses, UsageGate,
};
use tempfile::TempDir;

/// Returns a fixed text and records the language it was asked for.
struct FakeRecognizer {
    text: Result<String, ()>,
    calls: AtomicUsize,
}

impl FakeRecognizer {
    fn ok(text: &str) -> Self {
        Self {
            text: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            text: Err(()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Recognizer for FakeRecognizer {
    async fn recognize(
        &self,
        _image: &ImageSource,
        language: LanguageModel,
    ) -> Result<String, RecognitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.text {
            Ok(text) => Ok(format!("[{}] {}", language, text)),
            Err(()) => Err(RecognitionError::InvalidOutput),
        }
    }
}

/// Preference store on a read-only medium: reads see nothing, writes fail.
struct ReadOnlyPreferences;

impl PreferenceStore for ReadOnlyPreferences {
    fn get_int(&self, _key: &str, default: i64) -> i64 {
        default
    }

    fn put_int(&self, _key: &str, _value: i64) -> escan_core::Result<()> {
        Err(CoreError::config("preferences are read-only"))
    }

    fn get_string(&self, _key: &str) -> Option<String> {
        None
    }

    fn put_string(&self, _key: &str, _value: &str) -> escan_core::Result<()> {
        Err(CoreError::config("preferences are read-only"))
    }

    fn remove(&self, _key: &str) -> escan_core::Result<()> {
        Err(CoreError::config("preferences are read-only"))
    }

    fn update_int(
        &self,
        _key: &str,
        _default: i64,
        _f: &mut dyn FnMut(i64) -> i64,
    ) -> escan_core::Result<i64> {
        Err(CoreError::config("preferences are read-only"))
    }
}

struct Env {
    tmp: TempDir,
    gate: UsageGate,
    library: Library,
}

fn env() -> Env {
    let tmp = TempDir::new().unwrap();
    let auth = Arc::new(LocalAuthBackend::open(&tmp.path().join("accounts.json")).unwrap());
    let gate = UsageGate::new(auth, Arc::new(MemoryPreferences::new()));
    let library = Library::new(
        DocumentStore::open_in_memory().unwrap(),
        ImageStore::new(tmp.path().join("scans")),
    );
    Env { tmp, gate, library }
}

fn photo(env: &Env) -> ImageSource {
    let path = env.tmp.path().join("photo.jpg");
    std::fs::write(&path, b"jpeg-bytes").unwrap();
    ImageSource::Path(path)
}

#[tokio::test]
async fn anonymous_extraction_saves_and_counts() {
    let env = env();
    env.gate.sign_in_anonymously().await;
    let recognizer = FakeRecognizer::ok("hello");
    let flow = ExtractionFlow::new(&env.gate, &recognizer, &env.library);

    let mut request = ExtractionRequest::new(photo(&env));
    request.language = LanguageModel::Japanese;
    let outcome = flow.run(request).await.unwrap();

    let ExtractionOutcome::Saved { document, remaining } = outcome else {
        panic!("expected a saved document");
    };
    assert_eq!(remaining, RemainingUses::Limited(2));
    assert!(document.id > 0);
    assert_eq!(document.category, "Personal");
    assert!(document.file_name.starts_with("Text_"));
    assert_eq!(document.extracted_text.as_deref(), Some("[japanese] hello"));

    let image = document.image_path.clone().unwrap();
    assert!(image.starts_with(env.tmp.path().join("scans")));
    assert_eq!(std::fs::read(&image).unwrap(), b"jpeg-bytes");

    let stored = env.library.store().get_by_id(document.id).unwrap().unwrap();
    assert_eq!(stored, document);
}

#[tokio::test]
async fn fourth_anonymous_extraction_is_blocked() {
    let env = env();
    env.gate.sign_in_anonymously().await;
    let recognizer = FakeRecognizer::ok("x");
    let flow = ExtractionFlow::new(&env.gate, &recognizer, &env.library);

    for _ in 0..3 {
        let outcome = flow.run(ExtractionRequest::new(photo(&env))).await.unwrap();
        assert!(matches!(outcome, ExtractionOutcome::Saved { .. }));
    }
    let outcome = flow.run(ExtractionRequest::new(photo(&env))).await.unwrap();
    match outcome {
        ExtractionOutcome::Blocked { access, notice } => {
            assert_eq!(access, Access::QuotaExhausted);
            assert_eq!(notice.title, "Usage Limit Reached");
        }
        other => panic!("expected blocked, got {:?}", other),
    }
    assert_eq!(recognizer.calls.load(Ordering::SeqCst), 3);
    assert_eq!(env.gate.extract_feature_count(), 3);
    assert_eq!(env.library.store().list_all().unwrap().len(), 3);
}

#[tokio::test]
async fn handwriting_requires_registration() {
    let env = env();
    env.gate.sign_in_anonymously().await;
    let recognizer = FakeRecognizer::ok("x");
    let flow = ExtractionFlow::new(&env.gate, &recognizer, &env.library);

    let mut request = ExtractionRequest::new(photo(&env));
    request.kind = DocumentKind::Handwriting;
    let outcome = flow.run(request).await.unwrap();
    assert!(matches!(
        outcome,
        ExtractionOutcome::Blocked {
            access: Access::RegistrationRequired,
            ..
        }
    ));
    assert_eq!(recognizer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn permanent_user_with_custom_name_and_category() {
    let env = env();
    env.gate.sign_up("ada@example.com", "secret1", "Ada").await;
    let recognizer = FakeRecognizer::ok("notes");
    let flow = ExtractionFlow::new(&env.gate, &recognizer, &env.library);

    let mut request = ExtractionRequest::new(ImageSource::Bytes(b"raw".to_vec()));
    request.kind = DocumentKind::Handwriting;
    request.file_name = Some("  Lecture 1 ".to_string());
    request.category = Some("School".to_string());

    let ExtractionOutcome::Saved { document, remaining } = flow.run(request).await.unwrap() else {
        panic!("expected a saved document");
    };
    assert_eq!(remaining, RemainingUses::Unlimited);
    assert_eq!(document.file_name, "Lecture 1");
    assert_eq!(document.category, "School");
    assert_eq!(
        document.image_path.as_ref().unwrap().file_name().unwrap(),
        "Lecture 1.jpg"
    );
    assert_eq!(env.gate.extract_feature_count(), 0);
}

#[tokio::test]
async fn recognition_failure_still_consumes_quota() {
    let env = env();
    env.gate.sign_in_anonymously().await;
    let recognizer = FakeRecognizer::failing();
    let flow = ExtractionFlow::new(&env.gate, &recognizer, &env.library);

    let err = flow
        .run(ExtractionRequest::new(photo(&env)))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Recognition(_)));
    assert_eq!(env.gate.extract_feature_count(), 1);
    assert!(env.library.store().list_all().unwrap().is_empty());
    assert!(!env.tmp.path().join("scans").exists());
}

#[tokio::test]
async fn signed_out_user_must_sign_in() {
    let env = env();
    let recognizer = FakeRecognizer::ok("x");
    let flow = ExtractionFlow::new(&env.gate, &recognizer, &env.library);

    let outcome = flow.run(ExtractionRequest::new(photo(&env))).await.unwrap();
    assert!(matches!(
        outcome,
        ExtractionOutcome::Blocked {
            access: Access::SignInRequired,
            ..
        }
    ));
}

#[tokio::test]
async fn dot_only_name_falls_back_to_default_image_name() {
    let env = env();
    env.gate.sign_in_anonymously().await;
    let recognizer = FakeRecognizer::ok("dots");
    let flow = ExtractionFlow::new(&env.gate, &recognizer, &env.library);

    let mut request = ExtractionRequest::new(photo(&env));
    request.file_name = Some("...".to_string());
    let ExtractionOutcome::Saved { document, remaining } = flow.run(request).await.unwrap() else {
        panic!("expected a saved document");
    };

    assert_eq!(remaining, RemainingUses::Limited(2));
    assert_eq!(document.file_name, "...");
    let image = document.image_path.clone().unwrap();
    let image_name = image.file_name().unwrap().to_string_lossy().to_string();
    assert!(image_name.starts_with("Text_"), "image: {}", image_name);
    assert!(image_name.ends_with(".jpg"));
    assert!(image.exists());

    assert_eq!(env.gate.extract_feature_count(), 1);
    assert_eq!(env.library.store().list_all().unwrap(), vec![document]);
}

#[tokio::test]
async fn unrecorded_use_refuses_extraction() {
    let tmp = TempDir::new().unwrap();
    let auth = Arc::new(LocalAuthBackend::open(&tmp.path().join("accounts.json")).unwrap());
    let gate = UsageGate::new(auth, Arc::new(ReadOnlyPreferences));
    let library = Library::new(
        DocumentStore::open_in_memory().unwrap(),
        ImageStore::new(tmp.path().join("scans")),
    );
    gate.sign_in_anonymously().await;
    let recognizer = FakeRecognizer::ok("free ride");
    let flow = ExtractionFlow::new(&gate, &recognizer, &library);

    let image = tmp.path().join("photo.jpg");
    std::fs::write(&image, b"jpeg-bytes").unwrap();
    let err = flow
        .run(ExtractionRequest::new(ImageSource::Path(image)))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Config(_)));
    assert_eq!(recognizer.calls.load(Ordering::SeqCst), 0);
    assert!(library.store().list_all().unwrap().is_empty());
    assert!(!tmp.path().join("scans").exists());
}

#[tokio::test]
async fn permanent_user_is_not_affected_by_unwritable_counter() {
    let tmp = TempDir::new().unwrap();
    let auth = Arc::new(LocalAuthBackend::open(&tmp.path().join("accounts.json")).unwrap());
    let gate = UsageGate::new(auth, Arc::new(ReadOnlyPreferences));
    let library = Library::new(
        DocumentStore::open_in_memory().unwrap(),
        ImageStore::new(tmp.path().join("scans")),
    );
    assert!(gate.sign_up("ada@example.com", "secret1", "Ada").await.success);
    let recognizer = FakeRecognizer::ok("unlimited");
    let flow = ExtractionFlow::new(&gate, &recognizer, &library);

    let outcome = flow
        .run(ExtractionRequest::new(ImageSource::Bytes(b"raw".to_vec())))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        ExtractionOutcome::Saved {
            remaining: RemainingUses::Unlimited,
            ..
        }
    ));
}
