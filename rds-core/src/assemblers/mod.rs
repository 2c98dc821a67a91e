//! Fragment assemblers: PS, RadioText, PTYN, and Long PS each accumulate
//! characters across multiple groups into a stable, completion-tested
//! buffer (spec §4.4, §4.6, §4.7).

pub mod ps;
pub mod ptyn_lps;
pub mod rt;
