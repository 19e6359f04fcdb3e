use super::*;

#[test]
fn test_init_and_reload() {
	init("info", Mode::Compact).expect("failed to init logger");
	init("debug,sqlx=warn", Mode::Json).expect("failed to reload logger");
}

#[test]
fn test_init_bad_level() {
	assert!(matches!(init("info,social=notalevel", Mode::Default), Err(LoggingError::InvalidLevel(_))));
}

#[test]
fn test_mode_deserialize() {
	let mode: Mode = serde_json::from_str("\"pretty\"").unwrap();
	assert_eq!(mode, Mode::Pretty);
}
