// ABOUTME: Manifest parsing, validation, and container config derivation tests.
// ABOUTME: Mirrors the failure cases a manifest author can produce.

use gantry::manifest::{LABEL_MANAGED, LABEL_MANIFEST, LABEL_VERSION, Manifest, ManifestError};
use gantry::runtime::RestartPolicyConfig;

const FULL_MANIFEST: &str = r#"{
    "id": "64a1b2",
    "applicationId": "app-7",
    "manifestName": "demo",
    "versionNumber": "1.0",
    "labels": { "tier": "edge" },
    "networkDriver": "bridge",
    "modules": [
        {
            "name": "ingress",
            "image": {
                "name": "acme/mqtt-ingress",
                "tag": "v2",
                "registry": { "url": "registry.example.com", "userName": "bot", "password": "hunter2" }
            },
            "command": ["--qos", "1"],
            "env": { "BROKER_PORT": "1883" },
            "ports": [ { "host": 1883, "container": 1883 }, { "container": 9001, "protocol": "udp" } ],
            "mounts": [ { "source": "/var/data", "target": "/data", "readOnly": true } ],
            "resources": { "memory": 536870912, "cpus": 0.5 }
        },
        {
            "name": "processor",
            "image": { "name": "acme/processor" }
        }
    ]
}"#;

mod parsing {
    use super::*;

    #[test]
    fn full_manifest_parses() {
        let man = Manifest::from_json(FULL_MANIFEST).unwrap();
        assert_eq!(man.id, "64a1b2");
        assert_eq!(man.application_id, "app-7");
        assert_eq!(man.unique_id.manifest_name, "demo");
        assert_eq!(man.unique_id.version_number, "1.0");
        assert_eq!(man.modules.len(), 2);

        let ingress = &man.modules[0];
        assert_eq!(
            ingress.image_ref().unwrap().to_string(),
            "registry.example.com/acme/mqtt-ingress:v2"
        );
        assert_eq!(ingress.ports.len(), 2);
        assert_eq!(ingress.env.get("BROKER_PORT").map(String::as_str), Some("1883"));
        assert!(ingress.mounts[0].read_only);

        // Tag defaults to latest when absent.
        assert_eq!(
            man.modules[1].image_ref().unwrap().to_string(),
            "acme/processor:latest"
        );
    }

    #[test]
    fn registry_credentials_become_auth() {
        let man = Manifest::from_json(FULL_MANIFEST).unwrap();
        let auth = man.modules[0].registry_auth().expect("auth should exist");
        assert_eq!(auth.username, "bot");
        assert_eq!(auth.password, "hunter2");
        assert_eq!(auth.server.as_deref(), Some("registry.example.com"));

        assert!(man.modules[1].registry_auth().is_none());
    }

    #[test]
    fn numeric_version_numbers_are_accepted() {
        let man = Manifest::from_json(
            r#"{"manifestName":"demo","versionNumber":3,
                "modules":[{"name":"a","image":{"name":"nginx"}}]}"#,
        )
        .unwrap();
        assert_eq!(man.unique_id.version_number, "3");
    }

    #[test]
    fn invalid_json_fails() {
        assert!(matches!(
            Manifest::from_json("{not json"),
            Err(ManifestError::Json(_))
        ));
    }
}

mod validation {
    use super::*;

    fn with_modules(modules: &str) -> String {
        format!(
            r#"{{"manifestName":"demo","versionNumber":"1","modules":{modules}}}"#
        )
    }

    #[test]
    fn empty_module_list_fails() {
        assert!(matches!(
            Manifest::from_json(&with_modules("[]")),
            Err(ManifestError::EmptyModules)
        ));
    }

    #[test]
    fn missing_module_name_fails() {
        let err = Manifest::from_json(&with_modules(
            r#"[{"name":"","image":{"name":"nginx"}}]"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ManifestError::ModuleMissingName(0)));
    }

    #[test]
    fn duplicate_module_name_fails() {
        let err = Manifest::from_json(&with_modules(
            r#"[{"name":"a","image":{"name":"nginx"}},{"name":"a","image":{"name":"redis"}}]"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateModuleName(name) if name == "a"));
    }

    #[test]
    fn empty_image_name_fails() {
        let err = Manifest::from_json(&with_modules(r#"[{"name":"a","image":{"name":""}}]"#))
            .unwrap_err();
        assert!(matches!(err, ManifestError::InvalidImage(_)));
    }

    #[test]
    fn missing_manifest_name_fails() {
        let err = Manifest::from_json(
            r#"{"manifestName":"","versionNumber":"1",
                "modules":[{"name":"a","image":{"name":"nginx"}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ManifestError::MissingName));
    }
}

mod derivation {
    use super::*;

    #[test]
    fn container_configs_require_an_assigned_network() {
        let man = Manifest::from_json(FULL_MANIFEST).unwrap();
        assert!(matches!(
            man.container_configs(),
            Err(ManifestError::NetworkNotAssigned(_))
        ));
    }

    #[test]
    fn derived_configs_carry_network_labels_and_policy() {
        let mut man = Manifest::from_json(FULL_MANIFEST).unwrap();
        man.assign_network("gantry-demo-1.0");

        let configs = man.container_configs().unwrap();
        assert_eq!(configs.len(), 2);

        for config in &configs {
            // Every config references the manifest's assigned network.
            assert_eq!(config.network.as_deref(), Some("gantry-demo-1.0"));
            // Identity labels plus the author's own.
            assert_eq!(
                config.labels.get(LABEL_MANIFEST).map(String::as_str),
                Some("demo")
            );
            assert_eq!(
                config.labels.get(LABEL_VERSION).map(String::as_str),
                Some("1.0")
            );
            assert_eq!(
                config.labels.get(LABEL_MANAGED).map(String::as_str),
                Some("true")
            );
            assert_eq!(config.labels.get("tier").map(String::as_str), Some("edge"));
            // Modules ride out transient crashes.
            assert!(matches!(
                config.restart_policy,
                RestartPolicyConfig::OnFailure {
                    max_retries: Some(100)
                }
            ));
        }

        // Names are unique within the manifest version.
        assert_eq!(configs[0].name, "demo-1.0-ingress");
        assert_eq!(configs[1].name, "demo-1.0-processor");

        // Resource limits survive derivation.
        let resources = configs[0].resources.as_ref().unwrap();
        assert_eq!(resources.memory, Some(536870912));
        assert_eq!(resources.cpus, Some(0.5));
    }
}
