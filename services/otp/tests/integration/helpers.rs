use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use otpguard_otp::domain::repository::{Notifier, OtpRepository, SubjectPort};
use otpguard_otp::domain::types::{OtpPolicy, OtpRecord, Subject, SubjectStatus};
use otpguard_otp::error::OtpServiceError;
use otpguard_otp::usecase::code::{CodeGenerator, CodeHasher, HashCost};
use otpguard_otp::usecase::lock::IssueLocks;
use otpguard_otp::usecase::otp::{InvalidateOtpUseCase, IssueOtpUseCase, VerifyOtpUseCase};

// ── MockSubjectRepo ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MockSubjectRepo {
    pub subjects: Arc<Mutex<Vec<Subject>>>,
    /// Every successful `mark_active` call, in order.
    pub activations: Arc<Mutex<Vec<Uuid>>>,
    /// When set, the next `mark_active` fails and clears the flag.
    pub fail_next_activation: Arc<AtomicBool>,
}

impl MockSubjectRepo {
    pub fn new(subjects: Vec<Subject>) -> Self {
        Self {
            subjects: Arc::new(Mutex::new(subjects)),
            activations: Arc::new(Mutex::new(vec![])),
            fail_next_activation: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn failing_first_activation(self) -> Self {
        self.fail_next_activation.store(true, Ordering::SeqCst);
        self
    }

    pub fn empty() -> Self {
        Self::new(vec![])
    }

    pub fn status_of(&self, id: Uuid) -> Option<SubjectStatus> {
        self.subjects
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.status)
    }

    pub fn activation_count(&self) -> usize {
        self.activations.lock().unwrap().len()
    }
}

impl SubjectPort for MockSubjectRepo {
    async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<Subject>, OtpServiceError> {
        Ok(self
            .subjects
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.email == identifier)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Subject>, OtpServiceError> {
        Ok(self
            .subjects
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn mark_active(&self, id: Uuid) -> Result<(), OtpServiceError> {
        if self.fail_next_activation.swap(false, Ordering::SeqCst) {
            return Err(OtpServiceError::store(
                anyhow::anyhow!("connection reset"),
                "activate subject",
            ));
        }
        let mut subjects = self.subjects.lock().unwrap();
        if let Some(s) = subjects.iter_mut().find(|s| s.id == id) {
            s.status = SubjectStatus::Active;
        }
        self.activations.lock().unwrap().push(id);
        Ok(())
    }
}

// ── MockOtpRepo ──────────────────────────────────────────────────────────────

/// In-memory OTP store. Clones share the same records.
#[derive(Clone, Default)]
pub struct MockOtpRepo {
    pub records: Arc<Mutex<Vec<OtpRecord>>>,
    /// Applied before every call.
    pub latency: StdDuration,
    pub fail_create: bool,
}

impl MockOtpRepo {
    pub fn new(records: Vec<OtpRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
            ..Default::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: StdDuration) -> Self {
        self.latency = latency;
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn snapshot(&self) -> Vec<OtpRecord> {
        self.records.lock().unwrap().clone()
    }

    async fn wait(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn for_pair(&self, subject_id: Uuid, purpose: &str) -> Vec<OtpRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.subject_id == subject_id && r.purpose == purpose)
            .cloned()
            .collect()
    }
}

impl OtpRepository for MockOtpRepo {
    async fn create(&self, record: &OtpRecord) -> Result<(), OtpServiceError> {
        self.wait().await;
        if self.fail_create {
            return Err(OtpServiceError::store(
                anyhow::anyhow!("disk full"),
                "create otp",
            ));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn find_latest(
        &self,
        subject_id: Uuid,
        purpose: &str,
    ) -> Result<Option<OtpRecord>, OtpServiceError> {
        self.wait().await;
        Ok(self
            .for_pair(subject_id, purpose)
            .into_iter()
            .max_by_key(|r| r.created_at))
    }

    async fn count_since(
        &self,
        subject_id: Uuid,
        purpose: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, OtpServiceError> {
        self.wait().await;
        Ok(self
            .for_pair(subject_id, purpose)
            .iter()
            .filter(|r| r.created_at >= since)
            .count() as u64)
    }

    async fn list_newest_first(
        &self,
        subject_id: Uuid,
        purpose: &str,
    ) -> Result<Vec<OtpRecord>, OtpServiceError> {
        self.wait().await;
        let mut records = self.for_pair(subject_id, purpose);
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn mark_consumed(&self, id: Uuid) -> Result<bool, OtpServiceError> {
        self.wait().await;
        let mut records = self.records.lock().unwrap();
        match records.iter_mut().find(|r| r.id == id && !r.consumed) {
            Some(r) => {
                r.consumed = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_all(&self, subject_id: Uuid, purpose: &str) -> Result<u64, OtpServiceError> {
        self.wait().await;
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| !(r.subject_id == subject_id && r.purpose == purpose));
        Ok((before - records.len()) as u64)
    }
}

// ── MockNotifier ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub destination: String,
    pub subject: String,
    pub body: String,
}

/// Forwards every send to a channel so tests can await delivery.
#[derive(Clone)]
pub struct MockNotifier {
    tx: mpsc::UnboundedSender<SentMessage>,
    fail: bool,
}

impl MockNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SentMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, fail: false }, rx)
    }

    pub fn failing() -> (Self, mpsc::UnboundedReceiver<SentMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, fail: true }, rx)
    }
}

impl Notifier for MockNotifier {
    async fn send(
        &self,
        destination: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), OtpServiceError> {
        let _ = self.tx.send(SentMessage {
            destination: destination.to_owned(),
            subject: subject.to_owned(),
            body: body.to_owned(),
        });
        if self.fail {
            return Err(OtpServiceError::Delivery(anyhow::anyhow!("smtp refused")));
        }
        Ok(())
    }
}

/// Wait for the next spawned delivery, or `None` if nothing arrives in time.
pub async fn next_message(rx: &mut mpsc::UnboundedReceiver<SentMessage>) -> Option<SentMessage> {
    tokio::time::timeout(StdDuration::from_secs(2), rx.recv())
        .await
        .ok()
        .flatten()
}

// ── Test fixture helpers ─────────────────────────────────────────────────────

pub const PURPOSE: &str = "registration";

pub fn test_subject() -> Subject {
    Subject {
        id: Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap(),
        email: "user@example.com".to_owned(),
        status: SubjectStatus::Pending,
    }
}

pub fn fast_hasher() -> CodeHasher {
    CodeHasher::new(
        HashCost {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        },
        None,
    )
    .unwrap()
}

/// A stored record for `code`, created `age` ago.
pub fn record_with_code(
    hasher: &CodeHasher,
    subject_id: Uuid,
    purpose: &str,
    code: &str,
    age: Duration,
) -> OtpRecord {
    let created_at = Utc::now() - age;
    OtpRecord {
        id: Uuid::new_v4(),
        subject_id,
        purpose: purpose.to_owned(),
        code_hash: hasher.hash(code).unwrap(),
        created_at,
        expires_at: created_at + Duration::minutes(5),
        consumed: false,
    }
}

/// A stored record whose code is irrelevant to the test, created `age` ago.
pub fn past_record(subject_id: Uuid, purpose: &str, age: Duration) -> OtpRecord {
    let created_at = Utc::now() - age;
    OtpRecord {
        id: Uuid::new_v4(),
        subject_id,
        purpose: purpose.to_owned(),
        code_hash: "$argon2id$v=19$m=8,t=1,p=1$c2FsdHNhbHQ$aGFzaGhhc2hoYXNo".to_owned(),
        created_at,
        expires_at: created_at + Duration::minutes(5),
        consumed: false,
    }
}

pub fn issue_usecase(
    subjects: MockSubjectRepo,
    otps: MockOtpRepo,
    notifier: MockNotifier,
    policy: OtpPolicy,
) -> IssueOtpUseCase<MockSubjectRepo, MockOtpRepo, MockNotifier> {
    IssueOtpUseCase {
        subjects,
        otps,
        notifier,
        generator: Arc::new(CodeGenerator::new()),
        hasher: fast_hasher(),
        locks: IssueLocks::new(),
        policy,
    }
}

pub fn verify_usecase(
    subjects: MockSubjectRepo,
    otps: MockOtpRepo,
    hasher: CodeHasher,
) -> VerifyOtpUseCase<MockSubjectRepo, MockOtpRepo> {
    VerifyOtpUseCase {
        subjects,
        otps,
        hasher,
        policy: OtpPolicy::default(),
    }
}

pub fn invalidate_usecase(otps: MockOtpRepo) -> InvalidateOtpUseCase<MockOtpRepo> {
    InvalidateOtpUseCase {
        otps,
        policy: OtpPolicy::default(),
    }
}
