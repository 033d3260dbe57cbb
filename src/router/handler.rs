//! Request Handler
//!
//! Executes a resolved [`Route`] against the collector and the storage
//! executor and turns the outcome into a response. Performs no socket I/O.
//!
//! Both shared resources sit behind `RefCell`s. Every borrow is released
//! before the handler suspends, so interleaved tasks never observe a
//! borrow in progress.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use serde_json::json;

use crate::collector::Collector;
use crate::error::VaultError;
use crate::http::{Response, StatusCode, JSON_CONTENT_TYPE};
use crate::record::RecordPatch;
use crate::runtime::Handle;
use crate::storage::StorageExecutor;

use super::Route;

/// Shared state every connection task dispatches into
#[derive(Clone)]
pub struct RequestHandler {
    handle: Handle,
    collector: Rc<RefCell<Collector>>,
    executor: Rc<RefCell<Box<dyn StorageExecutor>>>,
    ingest_delay: Duration,
}

impl RequestHandler {
    pub fn new(
        handle: Handle,
        collector: Rc<RefCell<Collector>>,
        executor: Rc<RefCell<Box<dyn StorageExecutor>>>,
        ingest_delay: Duration,
    ) -> Self {
        Self {
            handle,
            collector,
            executor,
            ingest_delay,
        }
    }

    pub fn collector(&self) -> &Rc<RefCell<Collector>> {
        &self.collector
    }

    pub fn executor(&self) -> &Rc<RefCell<Box<dyn StorageExecutor>>> {
        &self.executor
    }

    /// Run `route`; `body` is only consulted for routes that need one
    pub async fn handle(&self, route: Route, body: Option<&[u8]>) -> Response {
        match route {
            Route::IngestOne => self.ingest_one().await,
            Route::IngestRemaining => self.ingest_remaining(),
            Route::ListPosts => self.list_posts(),
            Route::GetPost(id) => self.get_post(&id),
            Route::UpdatePost(id) => self.update_post(&id, body),
            Route::DeletePost(id) => self.delete_post(&id),
            Route::InvalidId => {
                Response::with_reason(StatusCode::NotFound, "Inadequate unique_id in uri")
            }
            Route::NotFound => Response::with_reason(StatusCode::NotFound, "Not found"),
        }
    }

    async fn ingest_one(&self) -> Response {
        if self.collector.borrow().is_empty() {
            return exhausted();
        }

        if let Err(e) = self.handle.sleep(self.ingest_delay).await {
            return internal_error(e);
        }

        // Another task may have drained the collector during the delay
        let Some(line) = self.collector.borrow_mut().get_one_entry() else {
            return exhausted();
        };

        match self.executor.borrow_mut().insert_one(&line) {
            Ok(Some(id)) => {
                tracing::info!("Stored record {}", id);
                json_response(StatusCode::Created, &json!({ "unique_id": id }))
            }
            Ok(None) => {
                Response::with_reason(StatusCode::InternalServerError, "Record not stored")
            }
            Err(e) => {
                // Failed writes leave the entry pending for a later attempt
                self.collector.borrow_mut().requeue(line);
                internal_error(e)
            }
        }
    }

    fn ingest_remaining(&self) -> Response {
        let lines: Vec<String> = {
            let collector = self.collector.borrow();
            if collector.is_empty() {
                return exhausted();
            }
            collector.entries().map(String::from).collect()
        };

        let ids = match self.executor.borrow_mut().insert(&lines) {
            Ok(ids) => ids,
            Err(e) => return internal_error(e),
        };
        self.collector.borrow_mut().clear();
        if ids.is_empty() {
            return Response::with_reason(StatusCode::InternalServerError, "No record stored");
        }

        tracing::info!(
            "Stored {} of {} remaining records",
            ids.len(),
            lines.len()
        );

        let objects: Vec<String> = ids
            .iter()
            .map(|id| json!({ "unique_id": id }).to_string())
            .collect();
        Response::new(StatusCode::Created).body(JSON_CONTENT_TYPE, objects.join(", ").into_bytes())
    }

    fn list_posts(&self) -> Response {
        match self.executor.borrow_mut().find_all() {
            Ok(records) => json_response(StatusCode::Ok, &records),
            Err(e) => internal_error(e),
        }
    }

    fn get_post(&self, id: &str) -> Response {
        match self.executor.borrow_mut().find(id) {
            Ok(Some(record)) => json_response(StatusCode::Ok, &record),
            Ok(None) => entry_not_found(),
            Err(e) => internal_error(e),
        }
    }

    fn update_post(&self, id: &str, body: Option<&[u8]>) -> Response {
        let patch = match RecordPatch::from_json(body.unwrap_or_default(), id) {
            Ok(patch) => patch,
            Err(e) => {
                tracing::debug!("Rejected update body for {}: {}", id, e);
                return Response::with_reason(StatusCode::NotFound, "Improper request body");
            }
        };

        let record = patch.into_record(id);
        match self.executor.borrow_mut().update(&record, id) {
            Ok(true) => Response::with_reason(StatusCode::Ok, "Entry successfully updated"),
            Ok(false) => Response::with_reason(StatusCode::NotFound, "Update failure"),
            Err(e) => internal_error(e),
        }
    }

    fn delete_post(&self, id: &str) -> Response {
        match self.executor.borrow_mut().delete(id) {
            Ok(true) => Response::with_reason(StatusCode::NoContent, "Entry deleted"),
            Ok(false) => entry_not_found(),
            Err(e) => internal_error(e),
        }
    }
}

fn exhausted() -> Response {
    Response::with_reason(StatusCode::NotFound, "All parsed data exhausted")
}

fn entry_not_found() -> Response {
    Response::with_reason(StatusCode::NotFound, "Entry not found")
}

fn json_response<T: serde::Serialize + ?Sized>(status: StatusCode, value: &T) -> Response {
    Response::new(status)
        .json(value)
        .unwrap_or_else(internal_error)
}

fn internal_error(e: VaultError) -> Response {
    tracing::error!("Request failed: {}", e);
    Response::new(StatusCode::InternalServerError)
}
