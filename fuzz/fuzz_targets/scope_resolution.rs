#![no_main]

use ferrous_injector::{DiError, Provider, Resolver, RootScope, Scope};
use libfuzzer_sys::fuzz_target;

// Each byte is one operation on a small scope tree: create a child, provide a
// value, or resolve a name. Resolution must either succeed with the value
// declared by the nearest scope or report the name as missing.
fuzz_target!(|data: &[u8]| {
    let root = RootScope::new();
    let mut scopes: Vec<Scope> = vec![(*root).clone()];

    for (step, &byte) in data.iter().enumerate() {
        let scope = scopes[byte as usize % scopes.len()].clone();
        let name = format!("svc{}", byte % 8);

        match byte % 3 {
            0 if scopes.len() < 16 => {
                if let Ok(child) = scope.create_child(format!("scope{}", step)) {
                    scopes.push(child);
                }
            }
            1 => match scope.provide(Provider::value(name.clone(), step)) {
                Ok(()) => assert!(scope.has_service(&name)),
                Err(DiError::DuplicateService { .. }) => assert!(scope.has_service(&name)),
                Err(other) => panic!("unexpected error: {}", other),
            },
            _ => match scope.invoke::<usize>(&name) {
                Ok(_) => assert!(scope.has_service_rec(&name)),
                Err(DiError::ServiceNotFound { available, .. }) => {
                    assert!(!scope.has_service_rec(&name));
                    assert!(!available.contains(&name));
                }
                Err(other) => panic!("unexpected error: {}", other),
            },
        }
    }
});
