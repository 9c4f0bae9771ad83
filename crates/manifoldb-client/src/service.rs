//! The transport seam.
//!
//! A [`VectorService`] carries one request to the server and returns its
//! response or the failure of that single attempt. Retry, pagination and
//! consistency handling all live above this trait, so a transport only has to
//! move bytes.

use std::sync::Arc;
use std::time::Duration;

use manifoldb_wire::protocol::{
    DropCollectionRequest, MutationRequest, MutationResponse, QueryRequest, QueryResponse,
    SearchRequest, SearchResponse,
};

use crate::retry::RpcFailure;

/// A remote vector-search service.
///
/// Every method performs exactly one attempt and must give up once `deadline`
/// has passed, reporting [`TransportCode::DeadlineExceeded`].
///
/// [`TransportCode::DeadlineExceeded`]: manifoldb_wire::protocol::TransportCode::DeadlineExceeded
pub trait VectorService: Send + Sync {
    /// Run a scalar query.
    ///
    /// # Errors
    ///
    /// Returns the transport or server failure of this attempt.
    fn query(&self, request: &QueryRequest, deadline: Duration)
        -> Result<QueryResponse, RpcFailure>;

    /// Run a vector search.
    ///
    /// # Errors
    ///
    /// Returns the transport or server failure of this attempt.
    fn search(
        &self,
        request: &SearchRequest,
        deadline: Duration,
    ) -> Result<SearchResponse, RpcFailure>;

    /// Insert, upsert or delete rows.
    ///
    /// # Errors
    ///
    /// Returns the transport or server failure of this attempt.
    fn mutate(
        &self,
        request: &MutationRequest,
        deadline: Duration,
    ) -> Result<MutationResponse, RpcFailure>;

    /// Drop a collection.
    ///
    /// # Errors
    ///
    /// Returns the transport or server failure of this attempt.
    fn drop_collection(
        &self,
        request: &DropCollectionRequest,
        deadline: Duration,
    ) -> Result<(), RpcFailure>;
}

impl<S: VectorService + ?Sized> VectorService for Arc<S> {
    fn query(
        &self,
        request: &QueryRequest,
        deadline: Duration,
    ) -> Result<QueryResponse, RpcFailure> {
        (**self).query(request, deadline)
    }

    fn search(
        &self,
        request: &SearchRequest,
        deadline: Duration,
    ) -> Result<SearchResponse, RpcFailure> {
        (**self).search(request, deadline)
    }

    fn mutate(
        &self,
        request: &MutationRequest,
        deadline: Duration,
    ) -> Result<MutationResponse, RpcFailure> {
        (**self).mutate(request, deadline)
    }

    fn drop_collection(
        &self,
        request: &DropCollectionRequest,
        deadline: Duration,
    ) -> Result<(), RpcFailure> {
        (**self).drop_collection(request, deadline)
    }
}
