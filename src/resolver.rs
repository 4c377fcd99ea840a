//! Cross-identity client resolution.
//!
//! Unifies three weakly-linked record sets — registered profiles, anonymous
//! visitor/device records, and bookings — into one derived `Client` per
//! distinguishable person. Nothing here is persisted; callers hand in a
//! point-in-time snapshot and get a recomputed view back.
//!
//! Identity is never guessed: a guest booking and a registered account that
//! happen to share an email stay two clients unless the booking explicitly
//! carries the account id. The only merge keys are the account id and the
//! anonymous correlation token.

use std::collections::BTreeMap;

use crate::db::{DbBooking, DbDevice, DbProfile, DbVisitor};
use crate::types::{Client, ClientFilter, ClientKind, ClientSort};

fn max_ts(current: &mut Option<String>, candidate: &str) {
    // RFC3339 UTC strings sort lexicographically.
    if current.as_deref().map(|c| candidate > c).unwrap_or(true) {
        *current = Some(candidate.to_string());
    }
}

fn fill_gap(slot: &mut Option<String>, candidate: Option<&str>) {
    // First non-empty value wins; later values only fill remaining gaps.
    if slot.as_deref().map(|s| s.is_empty()).unwrap_or(true) {
        if let Some(value) = candidate.filter(|v| !v.is_empty()) {
            *slot = Some(value.to_string());
        }
    }
}

fn empty_client(kind: ClientKind, key: &str) -> Client {
    Client {
        kind,
        key: key.to_string(),
        name: None,
        email: None,
        phone: None,
        booking_count: 0,
        booking_ids: Vec::new(),
        last_booking_at: None,
        last_active: None,
        devices: Vec::new(),
    }
}

/// Resolve a deduplicated client list from a snapshot of the store.
///
/// Bookings with neither an account reference nor an anonymous token are
/// orphans: logged and excluded, never fatal. A registered customer with
/// zero bookings still appears. Output is keyed deterministically (identity
/// key ascending within each kind) so repeated runs over an unchanged
/// snapshot are byte-identical once serialized.
pub fn resolve_clients(
    profiles: &[DbProfile],
    bookings: &[DbBooking],
    visitors: &[DbVisitor],
    devices: &[DbDevice],
) -> Vec<Client> {
    let mut registered: BTreeMap<String, Client> = BTreeMap::new();
    let mut unregistered: BTreeMap<String, Client> = BTreeMap::new();

    // 1. Seed one registered client per customer profile.
    for profile in profiles.iter().filter(|p| p.role == "customer") {
        let mut client = empty_client(ClientKind::Registered, &profile.id);
        client.name = Some(profile.full_name.clone());
        client.email = Some(profile.email.clone());
        max_ts(&mut client.last_active, &profile.created_at);
        registered.insert(profile.id.clone(), client);
    }

    // 2./3. Attach bookings: registered ones by account id, guest ones
    // grouped by anonymous token.
    for booking in bookings {
        let client = if let Some(user_id) = booking.requester_user_id.as_deref() {
            match registered.get_mut(user_id) {
                Some(client) => client,
                None => {
                    log::warn!(
                        "booking {} references unknown account {}; excluded from resolution",
                        booking.id,
                        user_id
                    );
                    continue;
                }
            }
        } else if let Some(token) = booking.visitor_token.as_deref() {
            let client = unregistered
                .entry(token.to_string())
                .or_insert_with(|| empty_client(ClientKind::Unregistered, token));
            fill_gap(&mut client.name, booking.guest_name.as_deref());
            fill_gap(&mut client.email, booking.guest_email.as_deref());
            fill_gap(&mut client.phone, booking.guest_phone.as_deref());
            client
        } else {
            log::warn!(
                "booking {} has no account reference or visitor token; excluded from resolution",
                booking.id
            );
            continue;
        };

        client.booking_count += 1;
        client.booking_ids.push(booking.id.clone());
        max_ts(&mut client.last_booking_at, &booking.created_at);
        max_ts(&mut client.last_active, &booking.created_at);
    }

    // 4. Fold visitor records into last_active.
    for visitor in visitors {
        if let Some(client) = visitor
            .user_id
            .as_deref()
            .and_then(|uid| registered.get_mut(uid))
        {
            max_ts(&mut client.last_active, &visitor.last_visit);
        }
        if let Some(client) = unregistered.get_mut(&visitor.visitor_token) {
            max_ts(&mut client.last_active, &visitor.last_visit);
        }
    }

    // 5. Attach devices wherever their identity key matches.
    for device in devices {
        if device.user_id.is_none() && device.visitor_token.is_none() {
            log::warn!(
                "device {} has no account reference or visitor token; excluded from resolution",
                device.id
            );
            continue;
        }
        if let Some(client) = device
            .user_id
            .as_deref()
            .and_then(|uid| registered.get_mut(uid))
        {
            max_ts(&mut client.last_active, &device.last_seen);
            client.devices.push(device.clone());
        }
        if let Some(client) = device
            .visitor_token
            .as_deref()
            .and_then(|token| unregistered.get_mut(token))
        {
            max_ts(&mut client.last_active, &device.last_seen);
            client.devices.push(device.clone());
        }
    }

    let mut clients: Vec<Client> = registered
        .into_values()
        .chain(unregistered.into_values())
        .collect();
    for client in &mut clients {
        client.booking_ids.sort();
        client.devices.sort_by(|a, b| a.id.cmp(&b.id));
    }
    clients
}

/// Apply a presentation filter: optional kind plus case-insensitive
/// free-text match over name, email, phone, and identity key.
pub fn filter_clients(clients: &[Client], filter: &ClientFilter) -> Vec<Client> {
    let query = filter.query.as_deref().map(str::to_lowercase);
    clients
        .iter()
        .filter(|c| filter.kind.map(|k| c.kind == k).unwrap_or(true))
        .filter(|c| {
            let Some(q) = query.as_deref() else {
                return true;
            };
            if q.is_empty() {
                return true;
            }
            c.key.to_lowercase().contains(q)
                || c.name.as_deref().map(|v| v.to_lowercase().contains(q)).unwrap_or(false)
                || c.email.as_deref().map(|v| v.to_lowercase().contains(q)).unwrap_or(false)
                || c.phone.as_deref().map(|v| v.to_lowercase().contains(q)).unwrap_or(false)
        })
        .cloned()
        .collect()
}

/// Sort in place with a stable comparator; ties always break by identity key
/// ascending so test output is deterministic.
pub fn sort_clients(clients: &mut [Client], sort: ClientSort) {
    match sort {
        ClientSort::LastActiveDesc => clients.sort_by(|a, b| {
            b.last_active
                .cmp(&a.last_active)
                .then_with(|| a.key.cmp(&b.key))
        }),
        ClientSort::BookingCountDesc => clients.sort_by(|a, b| {
            b.booking_count
                .cmp(&a.booking_count)
                .then_with(|| a.key.cmp(&b.key))
        }),
        ClientSort::NameAsc => clients.sort_by(|a, b| {
            let a_name = a.name.as_deref().map(str::to_lowercase);
            let b_name = b.name.as_deref().map(str::to_lowercase);
            // Named clients first, then by name, then key.
            (a_name.is_none(), a_name, &a.key).cmp(&(b_name.is_none(), b_name, &b.key))
        }),
    }
}
