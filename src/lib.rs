/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
//! Safra is a building block for detecting the end of a distributed
//! computation. It implements Safra's variant of the Dijkstra-Scholten
//! termination detection algorithm for a fixed ring of processes.
//!
//! Processes exchange application messages however they like and
//! report their activity to a [`Terminator`]. Meanwhile a control
//! [`Token`] circulates the ring, collecting a dirty flag and the
//! running balance of sent and received messages. Once a token
//! completes a full round without any activity and with every sent
//! message accounted for, the master declares termination and every
//! [`Terminator::wait_for_termination`] call returns.
//!
//! * Bring Your Own Transport: terminators only need something that
//!   implements [`TokenMessenger`]: send a token to the next process,
//!   wait for one from the previous process. Tokens are two integers,
//!   so anything from in-memory queues ([`memory::ring`]) to MPI or
//!   plain sockets will do. Implement [`Transport`] instead and
//!   [`RingMessenger`] derives the ring topology from process ids.
//!
//! * Write your own wire format by implementing [`Codec`], or use the
//!   `bincode-codec` and `postcard-codec` features.
//!
//! * Fail fast: misuse (reusing a finalized terminator, reporting
//!   activity out of sequence, a messenger inventing tokens) is
//!   reported immediately as an [`Error`] instead of silently
//!   producing a wrong answer.
//!
//! ~~~rust
//! use std::thread;
//!
//! let messengers = safra::memory::ring(3).unwrap();
//!
//! thread::scope(|scope| {
//!     for messenger in &messengers {
//!         scope.spawn(move || {
//!             let terminator = safra::Terminator::create_new(messenger);
//!             // ... do some work, exchange messages ...
//!             terminator.set_done().unwrap();
//!             terminator.wait_for_termination().unwrap();
//!         });
//!     }
//! });
//! ~~~
//!
#![forbid(unsafe_code)]
#![deny(missing_docs, unreachable_pub)]
#![deny(rustdoc::broken_intra_doc_links)]
#![warn(
    clippy::all,
    clippy::await_holding_lock,
    clippy::checked_conversions,
    clippy::dbg_macro,
    clippy::debug_assert_with_mut_call,
    clippy::doc_markdown,
    clippy::empty_enum,
    clippy::enum_glob_use,
    clippy::exit,
    clippy::expl_impl_clone_on_copy,
    clippy::explicit_deref_methods,
    clippy::explicit_into_iter_loop,
    clippy::fallible_impl_from,
    clippy::filter_map_next,
    clippy::flat_map_option,
    clippy::fn_params_excessive_bools,
    clippy::from_iter_instead_of_collect,
    clippy::if_let_mutex,
    clippy::implicit_clone,
    clippy::inefficient_to_string,
    clippy::invalid_upcast_comparisons,
    clippy::large_types_passed_by_value,
    clippy::let_unit_value,
    clippy::linkedlist,
    clippy::macro_use_imports,
    clippy::manual_ok_or,
    clippy::map_err_ignore,
    clippy::map_flatten,
    clippy::map_unwrap_or,
    clippy::match_wild_err_arm,
    clippy::match_wildcard_for_single_variants,
    clippy::mem_forget,
    clippy::missing_enforced_import_renames,
    clippy::mut_mut,
    clippy::mutex_integer,
    clippy::needless_borrow,
    clippy::needless_continue,
    clippy::needless_for_each,
    clippy::option_option,
    clippy::rc_mutex,
    clippy::ref_option_ref,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::same_functions_in_if_condition,
    clippy::semicolon_if_nothing_returned,
    clippy::single_match_else,
    clippy::string_add_assign,
    clippy::string_add,
    clippy::trait_duplication_in_bounds,
    clippy::unimplemented,
    clippy::unnested_or_patterns,
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms
)]

mod codec;
mod error;
mod master;
pub mod memory;
mod messenger;
mod ring;
mod slave;
mod terminator;
mod token;
#[cfg(test)]
mod testing;

pub use crate::{
    codec::Codec,
    error::Error,
    messenger::TokenMessenger,
    ring::{Ring, RingMessenger, Transport},
    terminator::{Factory, Terminator},
    token::{Flag, Token},
};

#[cfg(feature = "postcard-codec")]
pub use crate::codec::postcard_impl::PostcardCodec;

#[cfg(feature = "bincode-codec")]
pub use crate::codec::bincode_impl::BincodeCodec;

type Result<T> = core::result::Result<T, Error>;
