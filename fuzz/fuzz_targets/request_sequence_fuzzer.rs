//! Fuzz target for [`RequestHandler`] request sequences
//!
//! Pairing must stay consistent no matter what clients send.
//!
//! # Strategy
//!
//! - A fixed population of registered users and spids
//! - Arbitrary sequences of protocol requests against them, with identifier
//!   strings that are sometimes valid, sometimes garbage, sometimes nil
//! - Arbitrary raw lock codes
//!
//! # Invariants
//!
//! - NEVER panic
//! - Without store faults, no request ever reports `FatalInconsistency`
//! - After every request, each user/spid pair satisfies the pairing invariant

#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use spidlink_core::{validator, EntityStore, MemoryStore, SameStatePolicy, SpidId, UserId};
use spidlink_harness::SimEnv;
use spidlink_proto::{
    ErrorKind, Position, Request, Response, ResponseBody, WireLockState, NIL_ID,
};
use spidlink_server::RequestHandler;

const USERS: usize = 3;
const SPIDS: usize = 3;

#[derive(Debug, Arbitrary)]
enum IdChoice {
    Known(u8),
    Nil,
    Garbage(String),
}

#[derive(Debug, Arbitrary)]
enum FuzzRequest {
    Associate { user: IdChoice, spid: IdChoice },
    Dissociate { user: IdChoice },
    SpidInfo { user: IdChoice, spid: IdChoice },
    LockChange { user: IdChoice, spid: IdChoice, code: u8 },
    DeleteUser { user: IdChoice },
    DeleteSpid { spid: IdChoice },
    Telemetry { spid: IdChoice, battery: u8 },
}

#[derive(Debug, Arbitrary)]
struct Input {
    seed: u64,
    strict: bool,
    requests: Vec<FuzzRequest>,
}

fn resolve(choice: &IdChoice, known: &[String]) -> String {
    match choice {
        IdChoice::Known(i) => known[usize::from(*i) % known.len()].clone(),
        IdChoice::Nil => NIL_ID.to_string(),
        IdChoice::Garbage(s) => s.clone(),
    }
}

fuzz_target!(|input: Input| {
    let store = Arc::new(MemoryStore::new());
    let policy = if input.strict { SameStatePolicy::Reject } else { SameStatePolicy::Accept };
    let handler = RequestHandler::new(Arc::clone(&store), SimEnv::with_seed(input.seed), policy);

    let mut users = Vec::with_capacity(USERS);
    let mut spids = Vec::with_capacity(SPIDS);
    for _ in 0..USERS {
        let register =
            Request::RegisterUser { name: "fuzz".to_string(), position: Position::default() };
        let Response::Ok { body: ResponseBody::User(user), .. } = handler.handle(register) else {
            return;
        };
        users.push(user.id);
    }
    for _ in 0..SPIDS {
        let register = Request::RegisterSpid { battery_level: 100, location: Position::default() };
        let Response::Ok { body: ResponseBody::Spid(spid), .. } = handler.handle(register) else {
            return;
        };
        spids.push(spid.id);
    }

    for request in input.requests {
        let request = match request {
            FuzzRequest::Associate { user, spid } => Request::RequestAssociation {
                user_id: resolve(&user, &users),
                spid_id: resolve(&spid, &spids),
            },
            FuzzRequest::Dissociate { user } => {
                Request::RequestDissociation { user_id: resolve(&user, &users) }
            },
            FuzzRequest::SpidInfo { user, spid } => Request::RequestSpidInfo {
                user_id: resolve(&user, &users),
                spid_id: resolve(&spid, &spids),
            },
            FuzzRequest::LockChange { user, spid, code } => Request::RequestLockChange {
                user_id: resolve(&user, &users),
                spid_id: resolve(&spid, &spids),
                lock_state: WireLockState(code),
            },
            FuzzRequest::DeleteUser { user } => {
                Request::DeleteUser { user_id: resolve(&user, &users) }
            },
            FuzzRequest::DeleteSpid { spid } => {
                Request::DeleteSpid { spid_id: resolve(&spid, &spids) }
            },
            FuzzRequest::Telemetry { spid, battery } => Request::UpdateSpid {
                spid_id: resolve(&spid, &spids),
                battery_level: battery,
                location: Position::default(),
            },
        };

        let response = handler.handle(request);
        assert_ne!(response.error_kind(), Some(ErrorKind::FatalInconsistency));

        for user_id in &users {
            let user = user_id.parse::<UserId>().ok().and_then(|id| store.get_user(id).ok());
            let Some(user) = user else { continue };
            for spid_id in &spids {
                let spid = spid_id.parse::<SpidId>().ok().and_then(|id| store.get_spid(id).ok());
                let Some(spid) = spid else { continue };
                assert!(validator::pairing_invariant_holds(&user.record, &spid.record));
            }
        }
    }
});
