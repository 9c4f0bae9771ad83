//! The client facade.

use std::fmt;
use std::sync::Arc;

use manifoldb_wire::protocol::{
    DropCollectionRequest, MutationKind, MutationRequest, MutationResponse, QueryRequest,
    QueryResponse, SearchRequest, SearchResponse,
};
use manifoldb_wire::{FieldData, QueryResults, SingleResult};
use tracing::debug;

use crate::config::ClientConfig;
use crate::dql::{
    self, QueryArguments, QueryIteratorArguments, ReadContext, SearchArguments,
    SearchIteratorArguments,
};
use crate::error::{Error, ErrorKind, Result};
use crate::iterator::{QueryIterator, SearchIterator, SearchIteratorV1, SearchIteratorV2};
use crate::pipeline::{no_validation, Pipeline};
use crate::service::VectorService;
use crate::timestamp::TimestampRegistry;

/// Service handle, configuration and registry shared by a client and the
/// iterators it creates.
pub(crate) struct Connection<S> {
    service: Arc<S>,
    config: ClientConfig,
    registry: Arc<TimestampRegistry>,
}

impl<S> Clone for Connection<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            config: self.config.clone(),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<S: VectorService> Connection<S> {
    fn pipeline(&self) -> Pipeline<'_> {
        Pipeline::new(&self.config.retry, self.config.rpc_deadline)
    }

    pub(crate) fn read_context(&self) -> ReadContext<'_> {
        ReadContext { default_database: &self.config.database, registry: &self.registry }
    }

    pub(crate) fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        self.pipeline().run(
            request,
            no_validation,
            |req, deadline| self.service.query(req, deadline),
            Ok,
        )
    }

    pub(crate) fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        self.pipeline().run(
            request,
            no_validation,
            |req, deadline| self.service.search(req, deadline),
            Ok,
        )
    }
}

/// A client for a remote vector-search service.
///
/// Every RPC runs through the retry executor configured by
/// [`ClientConfig::retry`]. Successful writes record their timestamp in the
/// client's [`TimestampRegistry`] so that later reads at session consistency
/// observe them.
///
/// # Example
///
/// ```ignore
/// use manifoldb_client::{Client, ClientConfig, QueryArguments};
///
/// let client = Client::new(service, ClientConfig::new());
/// let rows = client.query(&QueryArguments::new("docs").with_filter("id < 10"))?;
/// ```
pub struct Client<S> {
    conn: Connection<S>,
}

impl<S> fmt::Debug for Client<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.conn.config)
            .field("tracked_collections", &self.conn.registry.len())
            .finish_non_exhaustive()
    }
}

impl<S: VectorService> Client<S> {
    /// Create a client with its own timestamp registry.
    #[must_use]
    pub fn new(service: S, config: ClientConfig) -> Self {
        Self::from_shared(Arc::new(service), config)
    }

    /// Create a client over a shared service handle.
    #[must_use]
    pub fn from_shared(service: Arc<S>, config: ClientConfig) -> Self {
        Self {
            conn: Connection { service, config, registry: Arc::new(TimestampRegistry::new()) },
        }
    }

    /// Share a timestamp registry with other clients.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<TimestampRegistry>) -> Self {
        self.conn.registry = registry;
        self
    }

    /// The timestamp registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<TimestampRegistry> {
        &self.conn.registry
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.conn.config
    }

    /// The database used by requests that name none.
    #[must_use]
    pub fn current_database(&self) -> &str {
        &self.conn.config.database
    }

    /// Switch the current database.
    ///
    /// Clears the timestamp registry.
    pub fn use_database(&mut self, name: impl Into<String>) {
        self.conn.config.database = name.into();
        self.conn.registry.clear_all();
    }

    /// Run a scalar query.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty collection name, or the
    /// classified failure of the RPC.
    pub fn query(&self, args: &QueryArguments) -> Result<QueryResults> {
        dql::validate_dql(args)?;
        let request = dql::query_request(args, &self.conn.read_context());
        let response = self.conn.query(request)?;
        dql::query_results(response, args.options.output_fields.as_slice())
    }

    /// Run a vector search, returning one page per target vector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for missing targets or collection
    /// name, or the classified failure of the RPC.
    pub fn search(&self, args: &SearchArguments) -> Result<Vec<SingleResult>> {
        dql::validate_dql(args)?;
        let request = dql::search_request(args, &self.conn.read_context())?;
        let response = self.conn.search(request)?;
        dql::search_results(response.results, "", args.options.output_fields.as_slice())
    }

    /// Insert rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for empty or ragged columns, or the
    /// classified failure of the RPC.
    pub fn insert(&self, collection: &str, fields: Vec<FieldData>) -> Result<MutationResponse> {
        self.mutate(collection, MutationKind::Insert, fields, String::new())
    }

    /// Insert or replace rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for empty or ragged columns, or the
    /// classified failure of the RPC.
    pub fn upsert(&self, collection: &str, fields: Vec<FieldData>) -> Result<MutationResponse> {
        self.mutate(collection, MutationKind::Upsert, fields, String::new())
    }

    /// Delete the rows matching a filter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty filter, or the
    /// classified failure of the RPC.
    pub fn delete(&self, collection: &str, filter: &str) -> Result<MutationResponse> {
        self.mutate(collection, MutationKind::Delete, Vec::new(), filter.to_string())
    }

    fn mutate(
        &self,
        collection: &str,
        kind: MutationKind,
        fields_data: Vec<FieldData>,
        expr: String,
    ) -> Result<MutationResponse> {
        let request = MutationRequest {
            db_name: self.conn.config.database.clone(),
            collection_name: collection.to_string(),
            partition_name: String::new(),
            kind,
            fields_data,
            expr,
        };
        let registry = &self.conn.registry;
        self.conn.pipeline().run(
            request,
            validate_mutation,
            |req, deadline| self.conn.service.mutate(req, deadline),
            |response| {
                registry.update(
                    &self.conn.config.database,
                    collection,
                    response.timestamp,
                );
                debug!(
                    collection,
                    timestamp = response.timestamp,
                    "recorded write timestamp"
                );
                Ok(response)
            },
        )
    }

    /// Drop a collection and forget its write timestamp.
    ///
    /// # Errors
    ///
    /// Returns the classified failure of the RPC.
    pub fn drop_collection(&self, collection: &str) -> Result<()> {
        let request = DropCollectionRequest {
            db_name: self.conn.config.database.clone(),
            collection_name: collection.to_string(),
        };
        self.conn.pipeline().run(
            request,
            |req: &mut DropCollectionRequest| {
                if req.collection_name.is_empty() {
                    return Err(Error::invalid_argument("collection name must not be empty"));
                }
                Ok(())
            },
            |req, deadline| self.conn.service.drop_collection(req, deadline),
            |()| {
                self.conn.registry.remove(&self.conn.config.database, collection);
                Ok(())
            },
        )
    }

    /// Iterate the rows of a query in primary-key order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for invalid arguments, or the failure
    /// of the initial and seek queries.
    pub fn query_iterator(&self, args: QueryIteratorArguments) -> Result<QueryIterator<S>> {
        let mut iterator = QueryIterator::new(self.conn.clone(), args)?;
        iterator.init()?;
        Ok(iterator)
    }

    /// Iterate the hits of a search, preferring token continuation.
    ///
    /// Falls back to range probing when the server has no continuation
    /// tokens.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for invalid arguments, or the failure
    /// of the initial searches.
    pub fn search_iterator(&self, args: SearchIteratorArguments) -> Result<SearchIterator<S>> {
        match SearchIteratorV2::new(self.conn.clone(), args.clone()) {
            Ok(iterator) => Ok(SearchIterator::V2(iterator)),
            Err(e) if e.kind() == ErrorKind::NotSupported => {
                debug!(reason = %e, "falling back to range-probing search iterator");
                Ok(SearchIterator::V1(SearchIteratorV1::new(self.conn.clone(), args)?))
            }
            Err(e) => Err(e),
        }
    }

    /// Iterate the hits of a search by range probing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for invalid arguments, or the failure
    /// of the initial search.
    pub fn search_iterator_v1(&self, args: SearchIteratorArguments) -> Result<SearchIteratorV1<S>> {
        SearchIteratorV1::new(self.conn.clone(), args)
    }

    /// Iterate the hits of a search by continuation token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] if the server issues no token.
    pub fn search_iterator_v2(&self, args: SearchIteratorArguments) -> Result<SearchIteratorV2<S>> {
        SearchIteratorV2::new(self.conn.clone(), args)
    }
}

fn validate_mutation(request: &mut MutationRequest) -> Result<()> {
    if request.collection_name.is_empty() {
        return Err(Error::invalid_argument("collection name must not be empty"));
    }
    match request.kind {
        MutationKind::Delete => {
            if request.expr.trim().is_empty() {
                return Err(Error::invalid_argument("delete requires a filter expression"));
            }
        }
        MutationKind::Insert | MutationKind::Upsert => {
            let Some(first) = request.fields_data.first() else {
                return Err(Error::invalid_argument("no columns to write"));
            };
            let rows = first.len();
            if let Some(ragged) = request.fields_data.iter().find(|f| f.len() != rows) {
                return Err(Error::invalid_argument(format!(
                    "column '{}' holds {} rows, expected {rows}",
                    ragged.name,
                    ragged.len()
                )));
            }
        }
    }
    Ok(())
}
