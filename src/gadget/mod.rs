// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-request gadget state: the request context, locale resolution,
//! hangman substitutions, and iframe/locked-domain URLs.

mod blacklist;
mod context;
#[allow(clippy::module_inception)]
mod gadget;
mod locale;
mod substitutions;
mod urls;

pub use blacklist::GadgetBlacklist;
pub use context::{GadgetContext, RenderingContext, USER_PREF_PREFIX};
pub use gadget::Gadget;
pub use locale::{matching_locales, resolve_messages, Locale, ResolvedMessages};
pub use substitutions::{SubstitutionType, Substitutions};
pub use urls::{IframeUrlBuilder, LockedDomainService, LOCKED_DOMAIN_FEATURE};
pub(crate) use urls::append_query;
