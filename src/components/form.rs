//! Inline form feedback shared by the auth and profile pages.

use leptos::prelude::*;

use crate::net::error::FormFailure;

/// Message for one field, shown under its input.
#[component]
pub fn FieldError(failure: RwSignal<FormFailure>, field: &'static str) -> impl IntoView {
    move || {
        failure.with(|f| {
            f.field(field)
                .map(|message| view! { <p class="form-field__error">{message.to_owned()}</p> })
        })
    }
}

/// Form-level message when no field-specific one covers it.
#[component]
pub fn FormBanner(failure: RwSignal<FormFailure>) -> impl IntoView {
    move || {
        failure.with(|f| {
            f.banner()
                .map(|message| view! { <div class="form-banner" role="alert">{message.to_owned()}</div> })
        })
    }
}
