//! Request dispatch.
//!
//! Turns a decoded [`Request`] into calls on the coordinator and registry and
//! turns the outcome into a [`Response`]. Identifier syntax is checked here,
//! before anything reaches the store.

use std::sync::Arc;

use spidlink_core::{
    AssociationCoordinator, AssociationError, ConversionError, EntityRegistry, EntityStore,
    Environment, LockState, Operation, OperationError, SameStatePolicy, User,
    convert::{parse_spid_id, parse_user_id},
};
use spidlink_proto::{ErrorKind, Request, Response, ResponseBody};

/// Failed request, ready to be rendered as [`Response::Error`].
#[derive(Debug)]
struct Failure {
    operation: Operation,
    kind: ErrorKind,
    message: String,
}

impl Failure {
    fn invalid(operation: Operation, error: &ConversionError) -> Self {
        Self {
            operation,
            kind: ErrorKind::InvalidRequest,
            message: format!("failed to {operation}: {error}"),
        }
    }

    fn into_response(self) -> Response {
        Response::Error {
            operation: self.operation.name().to_string(),
            kind: self.kind,
            message: self.message,
        }
    }
}

impl From<OperationError> for Failure {
    fn from(error: OperationError) -> Self {
        Self {
            operation: error.operation,
            kind: error_kind(&error.source),
            message: error.to_string(),
        }
    }
}

/// Wire classification of a protocol error.
pub fn error_kind(error: &AssociationError) -> ErrorKind {
    match error {
        AssociationError::NotFound { .. } => ErrorKind::NotFound,
        AssociationError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
        AssociationError::AlreadyPaired { .. } => ErrorKind::AlreadyPaired,
        AssociationError::NotPaired { .. } => ErrorKind::NotPaired,
        AssociationError::InvalidTransition(_) => ErrorKind::InvalidTransition,
        AssociationError::InvalidBattery(_) => ErrorKind::InvalidRequest,
        AssociationError::ReadFailed(_) => ErrorKind::ReadFailed,
        AssociationError::WriteFailed(_) => ErrorKind::WriteFailed,
        AssociationError::FatalInconsistency { .. } => ErrorKind::FatalInconsistency,
    }
}

/// Dispatches requests against one shared store.
///
/// Cheap to share: wrap in an `Arc` and hand a clone to every connection.
#[derive(Debug)]
pub struct RequestHandler<S, E> {
    coordinator: AssociationCoordinator<Arc<S>>,
    registry: EntityRegistry<Arc<S>, E>,
}

impl<S: EntityStore, E: Environment> RequestHandler<S, E> {
    /// Create a handler over `store`.
    pub fn new(store: Arc<S>, env: E, lock_policy: SameStatePolicy) -> Self {
        Self {
            coordinator: AssociationCoordinator::with_lock_policy(Arc::clone(&store), lock_policy),
            registry: EntityRegistry::new(store, env),
        }
    }

    /// Shared store.
    pub fn store(&self) -> &Arc<S> {
        self.coordinator.store()
    }

    /// Process one request.
    ///
    /// Never fails: every error becomes a [`Response::Error`].
    pub fn handle(&self, request: Request) -> Response {
        let operation = Operation::of(&request);
        tracing::trace!(%operation, "handling request");

        match self.dispatch(operation, request) {
            Ok((message, body)) => Response::Ok { message: message.to_string(), body },
            Err(failure) => failure.into_response(),
        }
    }

    fn dispatch(
        &self,
        op: Operation,
        request: Request,
    ) -> Result<(&'static str, ResponseBody), Failure> {
        let invalid = |e: ConversionError| Failure::invalid(op, &e);

        match request {
            Request::GetUser { user_id } => {
                let user_id = parse_user_id("user id", &user_id).map_err(invalid)?;
                let user = self.registry.get_user(user_id)?;
                Ok(("User queried successfully.", ResponseBody::User(user.to_record())))
            },

            Request::RegisterUser { name, position } => {
                let user = self.registry.register_user(&name, position)?;
                Ok(("User registered successfully.", ResponseBody::User(user.to_record())))
            },

            Request::UpdateUser { user_id, position } => {
                let user_id = parse_user_id("user id", &user_id).map_err(invalid)?;
                let user = self.registry.update_user_position(user_id, position)?;
                Ok(("User position updated successfully.", ResponseBody::User(user.to_record())))
            },

            Request::DeleteUser { user_id } => {
                let user_id = parse_user_id("user id", &user_id).map_err(invalid)?;
                self.registry.delete_user(user_id)?;
                Ok(("Deleted user successfully.", ResponseBody::Empty))
            },

            Request::GetSpid { spid_id } => {
                let spid_id = parse_spid_id("spid id", &spid_id).map_err(invalid)?;
                let spid = self.registry.get_spid(spid_id)?;
                Ok(("Spid queried successfully.", ResponseBody::Spid(spid.to_record())))
            },

            Request::RegisterSpid { battery_level, location } => {
                let spid = self.registry.register_spid(battery_level, location)?;
                Ok(("Spid registered successfully.", ResponseBody::Spid(spid.to_record())))
            },

            Request::UpdateSpid { spid_id, battery_level, location } => {
                let spid_id = parse_spid_id("spid id", &spid_id).map_err(invalid)?;
                let spid = self.registry.update_spid_telemetry(spid_id, battery_level, location)?;
                Ok(("Spid location updated successfully.", ResponseBody::Spid(spid.to_record())))
            },

            Request::DeleteSpid { spid_id } => {
                let spid_id = parse_spid_id("spid id", &spid_id).map_err(invalid)?;
                self.registry.delete_spid(spid_id)?;
                Ok(("Spid deleted successfully.", ResponseBody::Empty))
            },

            Request::RequestAssociation { user_id, spid_id } => {
                let user_id = parse_user_id("user id", &user_id).map_err(invalid)?;
                let spid_id = parse_spid_id("spid id", &spid_id).map_err(invalid)?;
                let user = self.coordinator.associate(user_id, spid_id)?;
                Ok(("Association request successful.", ResponseBody::User(user.to_record())))
            },

            Request::RequestDissociation { user_id } => {
                let user_id = parse_user_id("user id", &user_id).map_err(invalid)?;
                let user = self.coordinator.dissociate(user_id)?;
                Ok(("Dissociation request successful.", ResponseBody::User(user.to_record())))
            },

            Request::RequestSpidInfo { user_id, spid_id } => {
                let user_id = parse_user_id("user id", &user_id).map_err(invalid)?;
                let spid_id = parse_spid_id("spid id", &spid_id).map_err(invalid)?;
                let spid = self.coordinator.query_paired_spid(user_id, spid_id)?;
                Ok(("Spid info request successful.", ResponseBody::Spid(spid.to_record())))
            },

            Request::RequestLockChange { user_id, spid_id, lock_state } => {
                let user_id = parse_user_id("user id", &user_id).map_err(invalid)?;
                let spid_id = parse_spid_id("spid id", &spid_id).map_err(invalid)?;
                let requested = LockState::try_from(lock_state)
                    .map_err(|e| OperationError::new(op, AssociationError::InvalidTransition(e)))?;
                let spid = self.coordinator.change_lock_state(user_id, spid_id, requested)?;
                Ok(("Lock change request successful.", ResponseBody::Spid(spid.to_record())))
            },

            Request::AddRemoteUser { user } => {
                let user = User::try_from(&user).map_err(invalid)?;
                self.registry.add_remote_user(user)?;
                Ok(("User added remotely successfully.", ResponseBody::Empty))
            },

            Request::UpdateRemoteUser { user } => {
                let user = User::try_from(&user).map_err(invalid)?;
                self.registry.update_remote_user(user)?;
                Ok(("User updated remotely successfully.", ResponseBody::Empty))
            },

            Request::RemoveRemoteUser { user_id } => {
                let user_id = parse_user_id("user id", &user_id).map_err(invalid)?;
                self.registry.remove_remote_user(user_id)?;
                Ok(("User removed remotely successfully.", ResponseBody::Empty))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use spidlink_core::{EntityKind, StoreError, lock::TransitionError};

    use super::*;

    #[test]
    fn every_protocol_error_has_a_kind() {
        let cases = [
            (
                AssociationError::NotFound { kind: EntityKind::User, id: uuid::Uuid::nil() },
                ErrorKind::NotFound,
            ),
            (AssociationError::InvalidBattery(101), ErrorKind::InvalidRequest),
            (
                AssociationError::InvalidTransition(TransitionError::UnknownState { code: 9 }),
                ErrorKind::InvalidTransition,
            ),
            (
                AssociationError::WriteFailed(StoreError::Unavailable("down".to_string())),
                ErrorKind::WriteFailed,
            ),
            (
                AssociationError::ReadFailed(StoreError::Unavailable("down".to_string())),
                ErrorKind::ReadFailed,
            ),
        ];

        for (error, kind) in cases {
            assert_eq!(error_kind(&error), kind, "{error}");
        }
    }
}
