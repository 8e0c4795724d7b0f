//! Request handler tests

use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use spidlink_core::{Environment, MemoryStore, SameStatePolicy};
use spidlink_proto::{
    ErrorKind, NIL_ID, Position, Request, Response, ResponseBody, SpidRecord, UserRecord,
    WireLockState,
};
use spidlink_server::RequestHandler;

// Seeded environment so registered IDs are reproducible
#[derive(Clone)]
struct TestEnv(Arc<Mutex<ChaCha8Rng>>);

impl TestEnv {
    fn new(seed: u64) -> Self {
        Self(Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))))
    }
}

impl Environment for TestEnv {
    fn random_bytes(&self, buffer: &mut [u8]) {
        self.0.lock().unwrap().fill_bytes(buffer);
    }
}

fn handler() -> RequestHandler<MemoryStore, TestEnv> {
    RequestHandler::new(Arc::new(MemoryStore::new()), TestEnv::new(7), SameStatePolicy::Accept)
}

fn origin() -> Position {
    Position { latitude: 0.0, longitude: 0.0 }
}

fn register_user(handler: &RequestHandler<MemoryStore, TestEnv>) -> UserRecord {
    match handler.handle(Request::RegisterUser { name: "ada".to_string(), position: origin() }) {
        Response::Ok { body: ResponseBody::User(user), .. } => user,
        other => panic!("unexpected response: {other:?}"),
    }
}

fn register_spid(handler: &RequestHandler<MemoryStore, TestEnv>) -> SpidRecord {
    match handler.handle(Request::RegisterSpid { battery_level: 90, location: origin() }) {
        Response::Ok { body: ResponseBody::Spid(spid), .. } => spid,
        other => panic!("unexpected response: {other:?}"),
    }
}

fn associate(
    handler: &RequestHandler<MemoryStore, TestEnv>,
    user: &UserRecord,
    spid: &SpidRecord,
) -> Response {
    handler
        .handle(Request::RequestAssociation { user_id: user.id.clone(), spid_id: spid.id.clone() })
}

#[test]
fn registered_records_use_nil_references() {
    let handler = handler();

    let user = register_user(&handler);
    let spid = register_spid(&handler);

    assert_eq!(user.current_spid_id, NIL_ID);
    assert_eq!(spid.current_user_id, NIL_ID);
    assert_eq!(spid.lock_state, WireLockState::LOCKED);
}

#[test]
fn association_round_trip() {
    let handler = handler();
    let user = register_user(&handler);
    let spid = register_spid(&handler);

    let response = associate(&handler, &user, &spid);
    let Response::Ok { message, body: ResponseBody::User(paired) } = response else {
        panic!("association failed");
    };
    assert_eq!(message, "Association request successful.");
    assert_eq!(paired.current_spid_id, spid.id);

    let info = handler
        .handle(Request::RequestSpidInfo { user_id: user.id.clone(), spid_id: spid.id.clone() });
    let Response::Ok { body: ResponseBody::Spid(info), .. } = info else {
        panic!("spid info failed");
    };
    assert_eq!(info.current_user_id, user.id);

    let released = handler.handle(Request::RequestDissociation { user_id: user.id.clone() });
    let Response::Ok { body: ResponseBody::User(released), .. } = released else {
        panic!("dissociation failed");
    };
    assert_eq!(released.current_spid_id, NIL_ID);
}

#[test]
fn double_association_reports_already_paired() {
    let handler = handler();
    let user = register_user(&handler);
    let first = register_spid(&handler);
    let second = register_spid(&handler);
    assert!(associate(&handler, &user, &first).is_ok());

    let response = associate(&handler, &user, &second);
    let Response::Error { operation, kind, message } = response else {
        panic!("second association succeeded");
    };
    assert_eq!(operation, "request association");
    assert_eq!(kind, ErrorKind::AlreadyPaired);
    assert_eq!(
        message,
        format!(
            "failed to request association: user is already associated to spid with id `{}`",
            first.id
        )
    );
}

#[test]
fn dissociate_unpaired_reports_not_paired() {
    let handler = handler();
    let user = register_user(&handler);

    let response = handler.handle(Request::RequestDissociation { user_id: user.id.clone() });
    assert_eq!(response.error_kind(), Some(ErrorKind::NotPaired));
}

#[test]
fn lock_change_for_owner_only() {
    let handler = handler();
    let owner = register_user(&handler);
    let stranger = register_user(&handler);
    let spid = register_spid(&handler);
    assert!(associate(&handler, &owner, &spid).is_ok());

    let denied = handler.handle(Request::RequestLockChange {
        user_id: stranger.id.clone(),
        spid_id: spid.id.clone(),
        lock_state: WireLockState::UNLOCKED,
    });
    assert_eq!(denied.error_kind(), Some(ErrorKind::NotPaired));

    let granted = handler.handle(Request::RequestLockChange {
        user_id: owner.id.clone(),
        spid_id: spid.id.clone(),
        lock_state: WireLockState::UNLOCKED,
    });
    let Response::Ok { body: ResponseBody::Spid(unlocked), .. } = granted else {
        panic!("lock change failed");
    };
    assert_eq!(unlocked.lock_state, WireLockState::UNLOCKED);
}

#[test]
fn unknown_lock_code_is_invalid_transition() {
    let handler = handler();
    let user = register_user(&handler);
    let spid = register_spid(&handler);
    assert!(associate(&handler, &user, &spid).is_ok());

    let response = handler.handle(Request::RequestLockChange {
        user_id: user.id,
        spid_id: spid.id,
        lock_state: WireLockState(7),
    });
    assert_eq!(response.error_kind(), Some(ErrorKind::InvalidTransition));
}

#[test]
fn strict_policy_rejects_same_state_request() {
    let handler =
        RequestHandler::new(Arc::new(MemoryStore::new()), TestEnv::new(1), SameStatePolicy::Reject);
    let user = register_user(&handler);
    let spid = register_spid(&handler);
    assert!(associate(&handler, &user, &spid).is_ok());

    let response = handler.handle(Request::RequestLockChange {
        user_id: user.id,
        spid_id: spid.id,
        lock_state: WireLockState::LOCKED,
    });
    assert_eq!(response.error_kind(), Some(ErrorKind::InvalidTransition));
}

#[test]
fn unknown_entities_are_not_found() {
    let handler = handler();
    let user = register_user(&handler);

    let response = handler.handle(Request::RequestAssociation {
        user_id: user.id,
        spid_id: "0a9b8c7d-6e5f-4a3b-8c2d-1e0f9a8b7c6d".to_string(),
    });
    assert_eq!(response.error_kind(), Some(ErrorKind::NotFound));
}

#[test]
fn nil_identifier_is_invalid_request() {
    let handler = handler();

    let response = handler.handle(Request::GetUser { user_id: NIL_ID.to_string() });
    let Response::Error { kind, message, .. } = response else {
        panic!("nil id accepted");
    };
    assert_eq!(kind, ErrorKind::InvalidRequest);
    assert!(message.starts_with("failed to get user info: invalid user id"));
}

#[test]
fn battery_out_of_range_is_invalid_request() {
    let handler = handler();

    let response = handler.handle(Request::RegisterSpid { battery_level: 150, location: origin() });
    assert_eq!(response.error_kind(), Some(ErrorKind::InvalidRequest));
}

#[test]
fn paired_user_cannot_be_deleted() {
    let handler = handler();
    let user = register_user(&handler);
    let spid = register_spid(&handler);
    assert!(associate(&handler, &user, &spid).is_ok());

    let response = handler.handle(Request::DeleteUser { user_id: user.id.clone() });
    assert_eq!(response.error_kind(), Some(ErrorKind::AlreadyPaired));

    assert!(handler.handle(Request::RequestDissociation { user_id: user.id.clone() }).is_ok());
    assert!(handler.handle(Request::DeleteUser { user_id: user.id.clone() }).is_ok());
    assert_eq!(
        handler.handle(Request::GetUser { user_id: user.id }).error_kind(),
        Some(ErrorKind::NotFound)
    );
}

#[test]
fn remote_user_forwarders() {
    let handler = handler();
    let remote = UserRecord {
        id: "6f1c8a4e-2b1d-4c55-9a0e-0d1f2e3c4b5a".to_string(),
        name: "remote".to_string(),
        position: origin(),
        current_spid_id: NIL_ID.to_string(),
    };

    let added = handler.handle(Request::AddRemoteUser { user: remote.clone() });
    assert_eq!(
        added,
        Response::Ok {
            message: "User added remotely successfully.".to_string(),
            body: ResponseBody::Empty
        }
    );

    let again = handler.handle(Request::AddRemoteUser { user: remote.clone() });
    assert_eq!(again.error_kind(), Some(ErrorKind::AlreadyExists));

    let renamed = UserRecord { name: "renamed".to_string(), ..remote.clone() };
    assert!(handler.handle(Request::UpdateRemoteUser { user: renamed }).is_ok());

    let fetched = handler.handle(Request::GetUser { user_id: remote.id.clone() });
    let Response::Ok { body: ResponseBody::User(fetched), .. } = fetched else {
        panic!("remote user missing");
    };
    assert_eq!(fetched.name, "renamed");

    assert!(handler.handle(Request::RemoveRemoteUser { user_id: remote.id }).is_ok());
}

proptest! {
    #[test]
    fn malformed_ids_never_reach_the_store(raw in "[g-zG-Z_ ]{0,40}") {
        let handler = handler();

        let response = handler.handle(Request::RequestDissociation { user_id: raw });
        prop_assert_eq!(response.error_kind(), Some(ErrorKind::InvalidRequest));
        prop_assert_eq!(handler.store().user_count(), 0);
    }
}
