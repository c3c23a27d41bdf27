//! MongoDB backend built on the official async driver.

use super::{DocumentCursor, DocumentStore, FindOptions, ReadPreference, StoreCollection};
use crate::connection::{ConnectionSettings, DEFAULT_AUTH_DB, DEFAULT_AUTH_MECHANISM};
use crate::errors::{SeedError, StoreError};
use async_trait::async_trait;
use bson::Document;
use futures::TryStreamExt;
use mongodb::error::ErrorKind;
use mongodb::options::{
    AuthMechanism, ClientOptions, Credential, ReadPreference as DriverReadPreference,
    SelectionCriteria, ServerAddress, Tls, TlsOptions,
};
use mongodb::{Client, Collection, Cursor};
use std::str::FromStr;

const APP_NAME: &str = "MangoSeed";
const DEFAULT_CURSOR_BATCH: usize = 101;
const NAMESPACE_NOT_FOUND: &str = "ns not found";

#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    server: String,
}

impl MongoStore {
    /// Build a client for `settings`. The driver connects lazily, so this does no I/O.
    ///
    /// # Errors
    /// `InvalidAddress` for a malformed server, `Config` for an unknown auth mechanism, and
    /// `Store` when the driver rejects the options.
    pub fn connect(settings: &ConnectionSettings) -> Result<Self, SeedError> {
        let options = client_options(settings)?;
        let client = Client::with_options(options).map_err(map_error)?;
        log::info!("mongo client for {} (tls={})", settings.server, settings.use_tls);
        Ok(Self { client, server: settings.server.clone() })
    }
}

fn client_options(settings: &ConnectionSettings) -> Result<ClientOptions, SeedError> {
    let (host, port) = settings.server_address()?;
    let mut options = ClientOptions::default();
    options.hosts = vec![ServerAddress::Tcp { host, port: Some(port) }];
    options.app_name = Some(APP_NAME.to_string());
    if settings.use_tls {
        let mut tls = TlsOptions::default();
        if settings.allow_insecure_tls {
            tls.allow_invalid_certificates = Some(true);
        }
        options.tls = Some(Tls::Enabled(tls));
    }
    if let Some(user) = settings.user() {
        let name = settings.authentication_mechanism.as_deref().unwrap_or(DEFAULT_AUTH_MECHANISM);
        let mechanism = AuthMechanism::from_str(name)
            .map_err(|e| SeedError::Config(format!("authentication mechanism {name}: {e}")))?;
        let mut credential = Credential::default();
        credential.username = Some(user.to_string());
        credential.password = settings.password.clone();
        credential.source =
            Some(settings.authentication_database.clone().unwrap_or_else(|| DEFAULT_AUTH_DB.to_string()));
        credential.mechanism = Some(mechanism);
        options.credential = Some(credential);
    }
    Ok(options)
}

impl DocumentStore for MongoStore {
    fn collection(&self, database: &str, name: &str) -> Box<dyn StoreCollection> {
        Box::new(MongoCollection {
            inner: self.client.database(database).collection::<Document>(name),
            name: name.to_string(),
        })
    }

    fn describe(&self) -> String {
        format!("mongodb://{}", self.server)
    }
}

struct MongoCollection {
    inner: Collection<Document>,
    name: String,
}

#[async_trait]
impl StoreCollection for MongoCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_many(&self, docs: Vec<Document>) -> Result<u64, StoreError> {
        let result = self.inner.insert_many(docs).await.map_err(map_error)?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn delete_many(&self, filter: Document) -> Result<u64, StoreError> {
        let result = self.inner.delete_many(filter).await.map_err(map_error)?;
        Ok(result.deleted_count)
    }

    async fn find(
        &self,
        filter: Document,
        options: FindOptions,
    ) -> Result<Box<dyn DocumentCursor>, StoreError> {
        let mut driver_options = mongodb::options::FindOptions::default();
        driver_options.projection = options.projection;
        driver_options.batch_size = options.batch_size;
        if options.read_preference == ReadPreference::SecondaryPreferred {
            driver_options.selection_criteria = Some(SelectionCriteria::ReadPreference(
                DriverReadPreference::SecondaryPreferred { options: Default::default() },
            ));
        }
        let cursor = self.inner.find(filter).with_options(driver_options).await.map_err(map_error)?;
        let batch = options.batch_size.map_or(DEFAULT_CURSOR_BATCH, |b| (b as usize).max(1));
        Ok(Box::new(MongoCursor { inner: cursor, batch }))
    }

    async fn drop(&self) -> Result<(), StoreError> {
        match self.inner.drop().await {
            Ok(()) => Ok(()),
            Err(e) if e.to_string().contains(NAMESPACE_NOT_FOUND) => Ok(()),
            Err(e) => Err(map_error(e)),
        }
    }
}

/// Regroups the driver's document stream into batches of the requested size.
struct MongoCursor {
    inner: Cursor<Document>,
    batch: usize,
}

#[async_trait]
impl DocumentCursor for MongoCursor {
    async fn next_batch(&mut self) -> Result<Option<Vec<Document>>, StoreError> {
        let mut out = Vec::with_capacity(self.batch);
        while out.len() < self.batch {
            match self.inner.try_next().await.map_err(map_error)? {
                Some(doc) => out.push(doc),
                None => break,
            }
        }
        Ok(if out.is_empty() { None } else { Some(out) })
    }
}

fn map_error(err: mongodb::error::Error) -> StoreError {
    let message = err.to_string();
    match err.kind.as_ref() {
        ErrorKind::InsertMany(_) | ErrorKind::Write(_) if is_duplicate_key(&message) => {
            StoreError::DuplicateKey(message)
        }
        ErrorKind::Authentication { .. } => StoreError::Auth(message),
        ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } | ErrorKind::ConnectionPoolCleared { .. } => {
            StoreError::Transport(message)
        }
        _ => StoreError::Command(message),
    }
}

fn is_duplicate_key(message: &str) -> bool {
    message.contains("E11000") || message.contains("code: 11000")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_carry_host_app_name_and_tls() {
        let settings = ConnectionSettings {
            use_tls: true,
            allow_insecure_tls: true,
            ..ConnectionSettings::new("db.example:27018")
        };
        let opts = client_options(&settings).unwrap();
        assert_eq!(opts.hosts, vec![ServerAddress::Tcp { host: "db.example".into(), port: Some(27018) }]);
        assert_eq!(opts.app_name.as_deref(), Some(APP_NAME));
        match opts.tls {
            Some(Tls::Enabled(t)) => assert_eq!(t.allow_invalid_certificates, Some(true)),
            other => panic!("unexpected tls {other:?}"),
        }
        assert!(opts.credential.is_none());
    }

    #[test]
    fn credential_uses_mechanism_and_source() {
        let settings = ConnectionSettings {
            username: Some("seed".into()),
            password: Some("pw".into()),
            authentication_database: Some("users".into()),
            ..ConnectionSettings::default()
        };
        let cred = client_options(&settings).unwrap().credential.unwrap();
        assert_eq!(cred.username.as_deref(), Some("seed"));
        assert_eq!(cred.source.as_deref(), Some("users"));
        assert_eq!(cred.mechanism, Some(AuthMechanism::ScramSha1));
    }

    #[test]
    fn bad_server_is_rejected_before_connecting() {
        let err = MongoStore::connect(&ConnectionSettings::new("nowhere")).err().unwrap();
        assert!(matches!(err, SeedError::InvalidAddress(_)));
    }

    #[test]
    fn duplicate_key_detection() {
        assert!(is_duplicate_key("E11000 duplicate key error collection: test.animals"));
        assert!(!is_duplicate_key("connection reset"));
    }
}
