//! Service wiring: one owner for the store, the audit trail, the
//! notification center and the credential verifier, handing out module
//! repositories.

use std::path::Path;
use std::sync::Arc;

use crate::archive;
use crate::audit::{AuditMeta, AuditTrail};
use crate::error::Result;
use crate::notify::NotificationCenter;
use crate::records::audit_record::AuditRecordRepository;
use crate::records::batch::{BmrRepository, MfrRepository};
use crate::records::capa::CapaRepository;
use crate::records::change::ChangeRepository;
use crate::records::coa::CoaRepository;
use crate::records::deviation::DeviationRepository;
use crate::records::inventory::InventoryRepository;
use crate::records::lims::LimsRepository;
use crate::records::oos::OosRepository;
use crate::records::recall::RecallRepository;
use crate::records::risk::RiskRepository;
use crate::records::stability::StabilityRepository;
use crate::repository::Repository;
use crate::signature::{CredentialVerifier, SignatureGate, SignatureMeaning};
use crate::store::{KvStore, SledStore};
use crate::user::User;

/// Construction-time tunables. There is no config-file layer; deployments
/// inject what they need here.
#[derive(Debug, Clone, Copy)]
pub struct SystemConfig {
    pub audit_capacity: usize,
    pub notification_capacity: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self { audit_capacity: 5000, notification_capacity: 50 }
    }
}

pub struct QualitySystem {
    store: Arc<dyn KvStore>,
    audit: AuditTrail,
    notifier: NotificationCenter,
    verifier: Arc<dyn CredentialVerifier>,
}

impl QualitySystem {
    pub fn new(store: Arc<dyn KvStore>, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self::with_config(store, verifier, SystemConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn KvStore>,
        verifier: Arc<dyn CredentialVerifier>,
        config: SystemConfig,
    ) -> Self {
        let audit = AuditTrail::with_capacity(store.clone(), config.audit_capacity);
        let notifier = NotificationCenter::with_capacity(store.clone(), config.notification_capacity);
        Self { store, audit, notifier, verifier }
    }

    /// Open a sled-backed system at `path`.
    pub fn open(path: impl AsRef<Path>, verifier: Arc<dyn CredentialVerifier>) -> Result<Self> {
        Ok(Self::new(Arc::new(SledStore::open(path)?), verifier))
    }

    pub fn store(&self) -> Arc<dyn KvStore> {
        self.store.clone()
    }

    pub fn audit_trail(&self) -> &AuditTrail {
        &self.audit
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifier
    }

    /// Open a fresh signature interaction for one committing action.
    pub fn signature_gate(
        &self,
        action: impl Into<String>,
        default_meaning: SignatureMeaning,
    ) -> SignatureGate {
        SignatureGate::open(action, default_meaning, self.verifier.clone())
    }

    pub fn deviations(&self) -> DeviationRepository {
        DeviationRepository::new(self.store.clone(), self.audit.clone(), self.notifier.clone())
    }

    pub fn capas(&self) -> CapaRepository {
        CapaRepository::new(self.store.clone(), self.audit.clone(), self.notifier.clone())
    }

    pub fn audits(&self) -> AuditRecordRepository {
        Repository::new(self.store.clone(), self.audit.clone())
    }

    pub fn risks(&self) -> RiskRepository {
        Repository::new(self.store.clone(), self.audit.clone())
    }

    pub fn oos(&self) -> OosRepository {
        Repository::new(self.store.clone(), self.audit.clone())
    }

    pub fn recalls(&self) -> RecallRepository {
        Repository::new(self.store.clone(), self.audit.clone())
    }

    pub fn changes(&self) -> ChangeRepository {
        Repository::new(self.store.clone(), self.audit.clone())
    }

    pub fn stability(&self) -> StabilityRepository {
        Repository::new(self.store.clone(), self.audit.clone())
    }

    pub fn inventory(&self) -> InventoryRepository {
        Repository::new(self.store.clone(), self.audit.clone())
    }

    pub fn lims(&self) -> LimsRepository {
        Repository::new(self.store.clone(), self.audit.clone())
    }

    pub fn coas(&self) -> CoaRepository {
        Repository::new(self.store.clone(), self.audit.clone())
    }

    pub fn mfrs(&self) -> MfrRepository {
        Repository::new(self.store.clone(), self.audit.clone())
    }

    pub fn bmrs(&self) -> BmrRepository {
        Repository::new(self.store.clone(), self.audit.clone())
    }

    /// Bundle every present collection into one JSON document.
    pub fn export_archive(&self) -> Result<String> {
        archive::export(self.store.as_ref())
    }

    /// Overwrite collections from an exported document. Destructive; the
    /// ledger witnesses which collections were replaced.
    pub fn import_archive(&self, document: &str, user: &User) -> Result<Vec<String>> {
        let restored = archive::import(self.store.as_ref(), document)?;
        self.audit.record(
            user,
            "Restored System Backup",
            "Archive",
            format!("{} collections overwritten from backup", restored.len()),
            AuditMeta::default(),
        )?;
        Ok(restored)
    }
}
