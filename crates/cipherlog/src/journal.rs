//! The Journal: unified API over the feed, the private channel, and the
//! key machinery.
//!
//! One `Journal` speaks for one feed identity. Writes go to that identity's
//! own stream; reads can target any replicated author, subject to the key
//! material this identity has been sent.

use std::collections::BTreeSet;
use std::sync::Arc;

use cipherlog_core::{
    chunk_record, paginate, validate_record, AuthorId, ControlEvent, Event, PersistenceId,
    Reassembler, SequenceNr, Window, WireRecord,
};
use cipherlog_feed::{FeedLog, PrivateChannel, ReadQuery};
use cipherlog_keys::{
    batched, derive_key, generate_salt, seal, KeyInterval, KeyList, KeyShareMessage, SetKeyPayload,
};
use tokio::sync::mpsc;

use crate::config::JournalConfig;
use crate::decrypt::decrypt_event;
use crate::error::{JournalError, Result};
use crate::indexes::{AccessIndex, EntityIndex, KeyIndex};

/// The main journal handle for one identity.
pub struct Journal<L, P> {
    /// The feed identity this journal writes as.
    author: AuthorId,
    /// The replicated append-only feed.
    feed: Arc<L>,
    /// Private delivery for key material.
    channel: Arc<P>,
    config: JournalConfig,
}

impl<L: FeedLog, P: PrivateChannel> Journal<L, P> {
    /// Create a journal for `author` over shared feed and channel handles.
    ///
    /// The handles are shared so several identities (or a journal plus a
    /// test harness) can sit on the same replicated substrate.
    pub fn new(author: AuthorId, feed: Arc<L>, channel: Arc<P>, config: JournalConfig) -> Self {
        Self {
            author,
            feed,
            channel,
            config,
        }
    }

    /// The identity this journal writes as.
    pub fn author(&self) -> &AuthorId {
        &self.author
    }

    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────
    // Write path
    // ─────────────────────────────────────────────────────────────────────

    /// Persist one record to this identity's stream.
    ///
    /// Control manifests (set-key, grant, revoke) trigger their key
    /// distribution side effects before or around the append; everything
    /// else is encrypted under the entity's current key when one exists,
    /// chunked if oversized, and appended.
    ///
    /// Distribution is not transactional: a
    /// [`JournalError::Distribution`] means some recipients already hold
    /// the keys while others do not. Repeating the same call is safe,
    /// since appends and key-list merges are both idempotent.
    pub async fn persist(&self, record: WireRecord) -> Result<()> {
        validate_record(&record)?;
        match record.control_event() {
            Some(ControlEvent::SetKey) => self.persist_set_key(record).await,
            Some(ControlEvent::Grant { user }) => self.persist_grant(record, user).await,
            Some(ControlEvent::Revoke { user }) => self.persist_revoke(record, user).await,
            None => self.persist_event(record).await,
        }
    }

    async fn persist_event(&self, record: WireRecord) -> Result<()> {
        let keys = self.own_keys(&record.persistence_id).await?;
        self.seal_chunk_append(record, keys.current().cloned())
            .await
    }

    /// Rotate the entity key: derive, distribute to everyone on the access
    /// list plus ourselves, then append the set-key record sealed under the
    /// key it announces.
    ///
    /// Distributing before appending means a record sealed under a key
    /// nobody holds can never land on the feed.
    async fn persist_set_key(&self, mut record: WireRecord) -> Result<()> {
        let salt = generate_salt();
        let key = derive_key(&self.config.key_secret, &salt, self.config.kdf_iterations);
        let interval = KeyInterval::new(record.sequence_nr, key, self.config.nonce_length);

        let recipients = self
            .access_index()
            .await?
            .access_list_for(&record.persistence_id)
            .recipients_with(&self.author);
        self.distribute(&record.persistence_id, vec![interval.clone()], &recipients)
            .await?;

        tracing::info!(
            author = %self.author,
            persistence_id = %record.persistence_id,
            sequence_nr = record.sequence_nr,
            recipients = recipients.len(),
            "rotated entity key"
        );

        record.payload = serde_json::to_value(SetKeyPayload {
            key: interval.key.clone(),
            nonce_length: interval.nonce_length,
        })?;
        self.seal_chunk_append(record, Some(interval)).await
    }

    /// Grant a user access: send them the entire historical key list (so
    /// they can read from the beginning), then append the grant record.
    ///
    /// We address the share to ourselves as well, keeping our own key
    /// index a plain fold over our inbox.
    async fn persist_grant(&self, record: WireRecord, user: AuthorId) -> Result<()> {
        let keys = self.own_keys(&record.persistence_id).await?;
        if !keys.is_empty() {
            let recipients = vec![user.clone(), self.author.clone()];
            self.distribute(
                &record.persistence_id,
                keys.iter().cloned().collect(),
                &recipients,
            )
            .await?;
        }

        tracing::info!(
            author = %self.author,
            persistence_id = %record.persistence_id,
            user = %user,
            "granted access"
        );

        self.seal_chunk_append(record, keys.current().cloned())
            .await
    }

    /// Revoke a user's access and rotate: a fresh key takes effect at the
    /// revoking record's own sequence number, is distributed to everyone
    /// still on the list, and seals the revoke record itself. The revoked
    /// identity keeps its old intervals and can read everything strictly
    /// before the rotation point, nothing at or after it.
    async fn persist_revoke(&self, record: WireRecord, user: AuthorId) -> Result<()> {
        let keys = self.own_keys(&record.persistence_id).await?;
        if keys.is_empty() {
            // Plaintext entity: the revoke only updates the access list.
            return self.seal_chunk_append(record, None).await;
        }

        let salt = generate_salt();
        let key = derive_key(&self.config.key_secret, &salt, self.config.kdf_iterations);
        let next = KeyInterval::new(record.sequence_nr, key, self.config.nonce_length);

        let mut remaining = self
            .access_index()
            .await?
            .access_list_for(&record.persistence_id);
        remaining.revoke(&user);
        let recipients = remaining.recipients_with(&self.author);

        self.distribute(&record.persistence_id, vec![next.clone()], &recipients)
            .await?;

        tracing::info!(
            author = %self.author,
            persistence_id = %record.persistence_id,
            sequence_nr = record.sequence_nr,
            user = %user,
            remaining = recipients.len(),
            "revoked access and rotated entity key"
        );

        self.seal_chunk_append(record, Some(next)).await
    }

    /// Fan key intervals out over the private channel in bounded batches.
    ///
    /// Batches go out sequentially; the first failure aborts with a
    /// [`JournalError::Distribution`] carrying how far we got.
    async fn distribute(
        &self,
        persistence_id: &PersistenceId,
        intervals: Vec<KeyInterval>,
        recipients: &[AuthorId],
    ) -> Result<()> {
        if intervals.is_empty() || recipients.is_empty() {
            return Ok(());
        }
        let key_batches = batched(&intervals, self.config.max_keys_per_message);
        let recipient_batches = batched(recipients, self.config.max_recipients_per_message);
        let total = key_batches.len() * recipient_batches.len();
        let mut sent = 0;

        for recipients in &recipient_batches {
            for keys in &key_batches {
                let message =
                    serde_json::to_value(KeyShareMessage::new(persistence_id.clone(), keys.clone()))?;
                self.channel
                    .send(&self.author, message, recipients)
                    .await
                    .map_err(|source| JournalError::Distribution {
                        sent,
                        total,
                        source,
                    })?;
                sent += 1;
            }
        }

        tracing::debug!(
            persistence_id = %persistence_id,
            messages = total,
            "distributed key material"
        );
        Ok(())
    }

    /// Seal the payload under `interval` if one is given, chunk if the
    /// result exceeds the payload budget, append every part.
    async fn seal_chunk_append(
        &self,
        mut record: WireRecord,
        interval: Option<KeyInterval>,
    ) -> Result<()> {
        if let Some(interval) = interval {
            let serialized = serde_json::to_string(&record.payload)?;
            let sealed = seal(&interval.key, interval.nonce_length, serialized.as_bytes())?;
            record.payload = serde_json::Value::String(sealed);
            record.encrypted = true;
        }

        let parts = chunk_record(&record, self.config.payload_budget)?;
        let count = parts.len();
        for part in parts {
            self.feed.append(&self.author, part).await?;
        }

        tracing::debug!(
            author = %self.author,
            persistence_id = %record.persistence_id,
            sequence_nr = record.sequence_nr,
            parts = count,
            encrypted = record.encrypted,
            "appended record"
        );
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Read path
    // ─────────────────────────────────────────────────────────────────────

    /// Replay events for one entity stream in sequence order.
    ///
    /// `author` defaults to this journal's own identity. Part runs are
    /// reassembled before decryption; incomplete runs and undecryptable
    /// events are silently dropped, so the result is exactly what this
    /// identity is able to see.
    pub async fn events_by_persistence_id(
        &self,
        author: Option<&AuthorId>,
        persistence_id: &PersistenceId,
        from_sequence_nr: SequenceNr,
        to_sequence_nr: SequenceNr,
    ) -> Result<Vec<Event>> {
        let author = author.cloned().unwrap_or_else(|| self.author.clone());
        let keys = self.keys_for(persistence_id, &author).await?;

        let raw = self
            .feed
            .read(ReadQuery::entity_range(
                &author,
                persistence_id,
                from_sequence_nr,
                to_sequence_nr,
            ))
            .await?;

        let mut reassembler = Reassembler::new();
        let mut events = Vec::new();
        for keyed in raw {
            match reassembler.push(keyed.record) {
                Ok(emitted) => {
                    if let Some(event) = decrypt_event(&keys, emitted) {
                        events.push(event);
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        persistence_id = %persistence_id,
                        error = %err,
                        "malformed part run, skipping"
                    );
                }
            }
        }
        match reassembler.finish() {
            Ok(emitted) => {
                if let Some(event) = decrypt_event(&keys, emitted) {
                    events.push(event);
                }
            }
            Err(err) => {
                tracing::warn!(
                    persistence_id = %persistence_id,
                    error = %err,
                    "malformed trailing part run, skipping"
                );
            }
        }
        Ok(events)
    }

    /// The highest sequence number on an entity stream, 0 when empty.
    ///
    /// Counted over raw records, so an event we lack the key for still
    /// advances the result.
    pub async fn highest_sequence_number(
        &self,
        author: Option<&AuthorId>,
        persistence_id: &PersistenceId,
    ) -> Result<SequenceNr> {
        let author = author.cloned().unwrap_or_else(|| self.author.clone());
        let raw = self
            .feed
            .read(ReadQuery::entity_range(
                &author,
                persistence_id,
                1,
                SequenceNr::MAX,
            ))
            .await?;
        Ok(raw.last().map(|keyed| keyed.record.sequence_nr).unwrap_or(0))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Enumeration
    // ─────────────────────────────────────────────────────────────────────

    /// Entity ids this identity itself has written, in id order.
    pub async fn current_persistence_ids(&self, window: Window) -> Result<Vec<PersistenceId>> {
        let index = self.entity_index().await?;
        let ids = index
            .persistence_ids_for(&self.author)
            .map(|(_, pid)| pid.clone());
        Ok(paginate(ids, window).collect())
    }

    /// Entity ids written by `author` that this identity can see.
    ///
    /// An encrypted entity is visible only when our inbox holds key
    /// material for it; plaintext entities are always visible.
    pub async fn persistence_ids_for_author(
        &self,
        author: &AuthorId,
        window: Window,
    ) -> Result<Vec<PersistenceId>> {
        let index = self.entity_index().await?;
        let keys = self.key_index().await?;
        let ids = index
            .persistence_ids_for(author)
            .filter(|(encrypted, pid)| !*encrypted || keys.has_any_key(pid, author))
            .map(|(_, pid)| pid.clone());
        Ok(paginate(ids, window).collect())
    }

    /// Authors of `persistence_id` whose streams this identity can see.
    pub async fn authors_for_persistence_id(
        &self,
        persistence_id: &PersistenceId,
        window: Window,
    ) -> Result<Vec<AuthorId>> {
        let index = self.entity_index().await?;
        let keys = self.key_index().await?;
        let authors = index
            .authors_for(persistence_id)
            .filter(|(encrypted, author)| {
                !*encrypted || keys.has_any_key(persistence_id, author)
            })
            .map(|(_, author)| author.clone());
        Ok(paginate(authors, window).collect())
    }

    /// Every author with at least one entity visible to this identity.
    pub async fn all_authors(&self, window: Window) -> Result<Vec<AuthorId>> {
        let index = self.entity_index().await?;
        let keys = self.key_index().await?;
        let mut seen = BTreeSet::new();
        let authors = index
            .entries()
            .filter(|(author, encrypted, pid)| !*encrypted || keys.has_any_key(pid, author))
            .map(|(author, _, _)| author.clone())
            .filter(move |author| seen.insert(author.clone()));
        Ok(paginate(authors, window).collect())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Live queries
    // ─────────────────────────────────────────────────────────────────────

    /// Follow one entity stream: the replayed backlog first, then every
    /// new event as it lands, reassembled and decrypted. Dropping the
    /// receiver unsubscribes.
    ///
    /// Decryption uses the key material held at subscription time, the
    /// same snapshot rule as [`Journal::follow_authors`].
    pub async fn follow_events_by_persistence_id(
        &self,
        author: Option<&AuthorId>,
        persistence_id: &PersistenceId,
        from_sequence_nr: SequenceNr,
    ) -> Result<mpsc::UnboundedReceiver<Event>> {
        let author = author.cloned().unwrap_or_else(|| self.author.clone());
        let keys = self.keys_for(persistence_id, &author).await?;
        let persistence_id = persistence_id.clone();
        let mut raw = self.feed.follow(ReadQuery::entity_range(
            &author,
            &persistence_id,
            from_sequence_nr,
            SequenceNr::MAX,
        ));
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            // The stream never ends, so the reassembler is never finished:
            // a trailing incomplete run just waits for its next part.
            let mut reassembler = Reassembler::new();
            while let Some(keyed) = raw.recv().await {
                match reassembler.push(keyed.record) {
                    Ok(emitted) => {
                        if let Some(event) = decrypt_event(&keys, emitted) {
                            if tx.send(event).is_err() {
                                break;
                            }
                        }
                    }
                    Err(err) => {
                        tracing::warn!(
                            persistence_id = %persistence_id,
                            error = %err,
                            "malformed part run, skipping"
                        );
                    }
                }
            }
        });

        Ok(rx)
    }

    /// Follow this identity's own entity ids: the current backlog first,
    /// then every new entity as its first record lands. Dropping the
    /// receiver unsubscribes.
    pub fn follow_persistence_ids(&self) -> mpsc::UnboundedReceiver<PersistenceId> {
        let author = self.author.clone();
        let mut raw = self.feed.follow(ReadQuery::all());
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut seen = BTreeSet::new();
            while let Some(keyed) = raw.recv().await {
                if keyed.key.author != author || !first_record_of_entity(&keyed) {
                    continue;
                }
                let pid = keyed.record.persistence_id.clone();
                if seen.insert(pid.clone()) && tx.send(pid).is_err() {
                    break;
                }
            }
        });

        rx
    }

    /// Follow visible authors: backlog first, then every author whose
    /// first visible entity record lands after subscription.
    ///
    /// Visibility of encrypted entities is judged against the key material
    /// held at subscription time; keys arriving later take effect on the
    /// next subscription.
    pub async fn follow_authors(&self) -> Result<mpsc::UnboundedReceiver<AuthorId>> {
        let keys = self.key_index().await?;
        let mut raw = self.feed.follow(ReadQuery::all());
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut seen = BTreeSet::new();
            while let Some(keyed) = raw.recv().await {
                if !first_record_of_entity(&keyed) {
                    continue;
                }
                if keyed.record.encrypted
                    && !keys.has_any_key(&keyed.record.persistence_id, &keyed.key.author)
                {
                    continue;
                }
                let author = keyed.key.author.clone();
                if seen.insert(author.clone()) && tx.send(author).is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Folded views
    // ─────────────────────────────────────────────────────────────────────

    /// Fold the key index from this identity's private inbox.
    pub async fn key_index(&self) -> Result<KeyIndex> {
        let deliveries = self.channel.inbox(&self.author).await?;
        Ok(KeyIndex::fold(&deliveries))
    }

    /// Fold the access index from this identity's own control records.
    pub async fn access_index(&self) -> Result<AccessIndex> {
        let records = self.feed.read(ReadQuery::all()).await?;
        Ok(AccessIndex::fold(&self.author, &records))
    }

    /// Fold the entity index from the whole replicated feed.
    pub async fn entity_index(&self) -> Result<EntityIndex> {
        let records = self.feed.read(ReadQuery::all()).await?;
        Ok(EntityIndex::fold(&records))
    }

    async fn keys_for(&self, persistence_id: &PersistenceId, author: &AuthorId) -> Result<KeyList> {
        Ok(self
            .key_index()
            .await?
            .keys_for(persistence_id, author)
            .cloned()
            .unwrap_or_default())
    }

    async fn own_keys(&self, persistence_id: &PersistenceId) -> Result<KeyList> {
        self.keys_for(persistence_id, &self.author).await
    }
}

/// Whether this raw record is the one that introduces its entity: sequence
/// number one, and for a chunked first event only its first part.
fn first_record_of_entity(keyed: &cipherlog_feed::KeyedRecord) -> bool {
    keyed.record.sequence_nr == 1 && keyed.record.part.unwrap_or(1) == 1
}
