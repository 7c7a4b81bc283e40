//! MongoDB implementation of TicketRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::{
    Collection, Database, IndexModel,
    bson::{Document, doc, to_bson},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
};
use tracing::instrument;
use uuid::Uuid;

use crate::error::TicketResult;
use crate::models::{ServiceClass, Ticket, TicketStatus};
use crate::repository::TicketRepository;

/// MongoDB-backed ticket repository
///
/// Timestamps and UUIDs are stored in their serde forms, so every filter
/// value below goes through `to_bson` to match what is on disk.
#[derive(Clone)]
pub struct MongoTicketRepository {
    collection: Collection<Ticket>,
}

impl MongoTicketRepository {
    /// Create a new MongoTicketRepository on the `tickets` collection
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection::<Ticket>("tickets"),
        }
    }

    /// Create a repository with a custom collection name
    pub fn with_collection(db: &Database, collection_name: &str) -> Self {
        Self {
            collection: db.collection::<Ticket>(collection_name),
        }
    }

    /// Get the underlying collection for advanced operations
    pub fn collection(&self) -> &Collection<Ticket> {
        &self.collection
    }

    /// Create indexes for per-owner listing, counter queries, and call-next
    pub async fn create_indexes(&self) -> TicketResult<()> {
        let indexes = vec![
            // Per-owner listing by issuance time
            IndexModel::builder()
                .keys(doc! { "owner_id": 1, "issued_at": 1 })
                .build(),
            // Day-counter queries per class
            IndexModel::builder()
                .keys(doc! { "owner_id": 1, "service_class": 1, "issued_at": 1 })
                .build(),
            // Serve-order selection over the waiting set
            IndexModel::builder()
                .keys(doc! { "owner_id": 1, "status": 1, "priority_weight": -1, "issued_at": 1 })
                .build(),
        ];

        self.collection.create_indexes(indexes).await?;
        Ok(())
    }

    fn owner_filter(owner_id: Uuid) -> TicketResult<Document> {
        Ok(doc! { "owner_id": to_bson(&owner_id)? })
    }

    fn id_filter(id: Uuid) -> TicketResult<Document> {
        Ok(doc! { "_id": to_bson(&id)? })
    }

    /// Sort expressing the serve order: priority first, then FIFO, then id
    fn serve_order_sort() -> Document {
        doc! { "priority_weight": -1, "issued_at": 1, "_id": 1 }
    }
}

#[async_trait]
impl TicketRepository for MongoTicketRepository {
    #[instrument(skip(self, ticket), fields(ticket_id = %ticket.id))]
    async fn insert(&self, ticket: Ticket) -> TicketResult<Ticket> {
        self.collection.insert_one(&ticket).await?;

        tracing::info!(ticket_id = %ticket.id, "Ticket inserted");
        Ok(ticket)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> TicketResult<Option<Ticket>> {
        let ticket = self.collection.find_one(Self::id_filter(id)?).await?;
        Ok(ticket)
    }

    #[instrument(skip(self))]
    async fn list_by_owner(&self, owner_id: Uuid) -> TicketResult<Vec<Ticket>> {
        let options = FindOptions::builder()
            .sort(doc! { "issued_at": 1, "_id": 1 })
            .build();

        let cursor = self
            .collection
            .find(Self::owner_filter(owner_id)?)
            .with_options(options)
            .await?;

        let tickets: Vec<Ticket> = cursor.try_collect().await?;
        Ok(tickets)
    }

    #[instrument(skip(self))]
    async fn list_waiting(&self, owner_id: Uuid) -> TicketResult<Vec<Ticket>> {
        let mut filter = Self::owner_filter(owner_id)?;
        filter.insert("status", TicketStatus::Waiting.to_string());

        let options = FindOptions::builder()
            .sort(Self::serve_order_sort())
            .build();

        let cursor = self
            .collection
            .find(filter)
            .with_options(options)
            .await?;

        let tickets: Vec<Ticket> = cursor.try_collect().await?;
        Ok(tickets)
    }

    #[instrument(skip(self, ticket), fields(ticket_id = %ticket.id))]
    async fn replace(&self, ticket: &Ticket) -> TicketResult<()> {
        let result = self
            .collection
            .replace_one(Self::id_filter(ticket.id)?, ticket)
            .await?;

        if result.matched_count == 0 {
            return Err(crate::error::TicketError::NotFound(ticket.id));
        }

        tracing::info!(ticket_id = %ticket.id, "Ticket updated");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> TicketResult<bool> {
        let result = self.collection.delete_one(Self::id_filter(id)?).await?;

        if result.deleted_count > 0 {
            tracing::info!(ticket_id = %id, "Ticket deleted");
        }
        Ok(result.deleted_count > 0)
    }

    #[instrument(skip(self))]
    async fn delete_by_owner(&self, owner_id: Uuid) -> TicketResult<u64> {
        let result = self
            .collection
            .delete_many(Self::owner_filter(owner_id)?)
            .await?;

        tracing::info!(%owner_id, removed = result.deleted_count, "Queue reset");
        Ok(result.deleted_count)
    }

    #[instrument(skip(self))]
    async fn count_issued_since(
        &self,
        owner_id: Uuid,
        class: ServiceClass,
        since: DateTime<Utc>,
    ) -> TicketResult<u64> {
        let mut filter = Self::owner_filter(owner_id)?;
        filter.insert("service_class", class.to_string());
        filter.insert("issued_at", doc! { "$gte": to_bson(&since)? });

        let count = self.collection.count_documents(filter).await?;
        Ok(count)
    }

    #[instrument(skip(self))]
    async fn claim_next_waiting(
        &self,
        owner_id: Uuid,
        now: DateTime<Utc>,
    ) -> TicketResult<Option<Ticket>> {
        let mut filter = Self::owner_filter(owner_id)?;
        filter.insert("status", TicketStatus::Waiting.to_string());

        let update = doc! {
            "$set": {
                "status": TicketStatus::Serving.to_string(),
                "served_at": to_bson(&now)?,
            }
        };

        // One conditional update: selection and transition cannot race
        let options = FindOneAndUpdateOptions::builder()
            .sort(Self::serve_order_sort())
            .return_document(ReturnDocument::After)
            .build();

        let claimed = self
            .collection
            .find_one_and_update(filter, update)
            .with_options(options)
            .await?;

        if let Some(ref ticket) = claimed {
            tracing::info!(ticket_id = %ticket.id, "Ticket called to counter");
        }
        Ok(claimed)
    }
}
