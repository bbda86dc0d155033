//! Core Integration Tests
//!
//! Drives the public API end to end:
//! 1. Power lifecycle through the control loop
//! 2. Background scan timers
//! 3. Kill-switch aggregation and offline mode
//! 4. Persisted power choices
//! 5. Tethering and regulatory domain requests
//! 6. Link detection

mod common;

use common::{call_log, count, new_core, RecordingDriver, SharingDriver};
use libnetcore::config::NetcoreConfig;
use libnetcore::daemon::{CoreCommand, Daemon};
use libnetcore::detect::LinkEvent;
use libnetcore::notifier::CoreEvent;
use libnetcore::storage::{MemoryStore, ProfileStore};
use libnetcore::types::{DeviceId, DeviceType, ServiceType, TechnologyState};
use libnetcore::{NetCore, NetcoreError};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;

fn drain(rx: &mut Receiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn state_changes(events: &[CoreEvent], technology: ServiceType) -> Vec<TechnologyState> {
    events
        .iter()
        .filter_map(|event| match event {
            CoreEvent::TechnologyStateChanged { technology: t, state } if *t == technology => {
                Some(*state)
            }
            _ => None,
        })
        .collect()
}

fn wireless(index: u32, name: &str) -> LinkEvent {
    let mut link = LinkEvent::new(index, libc::ARPHRD_ETHER, name)
        .with_address([0x02, 0x00, 0x00, 0x00, 0x00, index as u8]);
    link.is_wireless = true;
    link
}

fn wired(index: u32, name: &str) -> LinkEvent {
    LinkEvent::new(index, libc::ARPHRD_ETHER, name)
        .with_address([0x02, 0x00, 0x00, 0x00, 0x01, index as u8])
}

fn add_device(core: &mut NetCore, ident: &str, interface: &str, device_type: DeviceType) -> DeviceId {
    let id = core.create_device(ident, device_type).unwrap();
    core.device_mut(id).unwrap().set_interface(interface);
    core.register_device(id).unwrap();
    id
}

// =============================================================================
// Power Lifecycle
// =============================================================================

mod power_tests {
    use super::*;

    #[tokio::test]
    async fn test_pending_enable_completes_through_control_loop() {
        let log = call_log();
        let mut daemon = Daemon::new(new_core());
        daemon
            .core_mut()
            .register_device_driver(Arc::new(RecordingDriver::new("wifi", None, &log).pending()))
            .unwrap();
        let mut rx = daemon.core().notifier().subscribe();
        let handle = daemon.handle();

        handle.send(CoreCommand::NewLink(wireless(3, "wlan0"))).unwrap();
        handle.device_powered(DeviceId(1), true).unwrap();
        handle.shutdown().unwrap();

        daemon.run().await;

        let events = drain(&mut rx);
        assert_eq!(
            state_changes(&events, ServiceType::Wifi),
            vec![
                TechnologyState::Available,
                TechnologyState::Enabled,
                TechnologyState::Available,
                TechnologyState::Offline,
            ]
        );
        assert!(events.contains(&CoreEvent::DeviceRemoved { device: DeviceId(1) }));
        assert_eq!(count(&log, "enable"), 1);
        assert_eq!(count(&log, "remove"), 1);
    }

    #[test]
    fn test_idempotent_power_requests() {
        let log = call_log();
        let mut core = new_core();
        core.register_device_driver(Arc::new(RecordingDriver::new("wired", None, &log)))
            .unwrap();
        let id = add_device(&mut core, "dev_eth0", "eth0", DeviceType::Ethernet);

        assert!(matches!(core.enable(id), Err(NetcoreError::AlreadyDone(_))));
        assert!(matches!(core.set_powered(id, true), Err(NetcoreError::AlreadyDone(_))));

        core.set_powered(id, false).unwrap();
        assert!(matches!(core.disable(id), Err(NetcoreError::LinkBlocked(_))));
        assert_eq!(count(&log, "enable"), 1);
        assert_eq!(count(&log, "disable"), 1);
    }
}

// =============================================================================
// Background Scanning
// =============================================================================

mod scan_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_scan_timer_fires_periodically() {
        let log = call_log();
        let mut daemon = Daemon::new(new_core());
        daemon
            .core_mut()
            .register_device_driver(Arc::new(RecordingDriver::new("wifi", None, &log)))
            .unwrap();
        daemon.core_mut().new_link(&wireless(3, "wlan0")).unwrap();
        let handle = daemon.handle();
        let task = tokio::spawn(daemon.run());

        handle.request_scan(ServiceType::Wifi).await.unwrap();
        assert_eq!(count(&log, "scan"), 1);

        tokio::time::sleep(Duration::from_secs(35)).await;
        handle.shutdown().unwrap();
        task.await.unwrap();

        assert_eq!(count(&log, "scan"), 4);
    }

    #[test]
    fn test_backoff_grows_until_networks_appear() {
        let log = call_log();
        let mut core = new_core();
        core.register_device_driver(Arc::new(RecordingDriver::new("wifi", None, &log)))
            .unwrap();
        let id = add_device(&mut core, "dev_wlan0", "wlan0", DeviceType::Wifi);

        let mut delays = Vec::new();
        for _ in 0..4 {
            core.scan(id).unwrap();
            let device = core.device(id).unwrap();
            delays.push(device.scan_scheduler().armed_interval().unwrap().as_secs());
        }
        assert_eq!(delays, vec![10, 20, 40, 80]);

        core.add_network(id, libnetcore::Network::new("ap")).unwrap();
        core.scan(id).unwrap();
        assert_eq!(
            core.device(id).unwrap().scan_scheduler().armed_interval(),
            Some(Duration::from_secs(300))
        );
    }

    #[test]
    fn test_disabled_background_scanning() {
        let mut config = NetcoreConfig::default();
        config.scanning.background_scanning = false;
        let log = call_log();
        let mut core = NetCore::new(config, Box::new(MemoryStore::new()));
        core.register_device_driver(Arc::new(RecordingDriver::new("wifi", None, &log)))
            .unwrap();
        let id = add_device(&mut core, "dev_wlan0", "wlan0", DeviceType::Wifi);

        core.scan(id).unwrap();
        assert!(core.next_scan_deadline().is_none());
    }
}

// =============================================================================
// Kill-switches and Offline Mode
// =============================================================================

mod rfkill_tests {
    use super::*;

    #[test]
    fn test_two_switches_block_once() {
        let log = call_log();
        let mut core = new_core();
        core.register_device_driver(Arc::new(RecordingDriver::new("wifi", None, &log)))
            .unwrap();
        let id = add_device(&mut core, "dev_wlan0", "wlan0", DeviceType::Wifi);
        core.add_rfkill(3, ServiceType::Wifi, false, false).unwrap();
        core.add_rfkill(4, ServiceType::Wifi, false, false).unwrap();
        let mut rx = core.notifier().subscribe();

        core.update_rfkill(3, true, false).unwrap();
        core.update_rfkill(4, false, true).unwrap();
        core.update_rfkill(3, false, false).unwrap();
        assert!(!core.device(id).unwrap().powered());

        core.update_rfkill(4, false, false).unwrap();
        assert!(core.device(id).unwrap().powered());

        let events = drain(&mut rx);
        assert_eq!(
            state_changes(&events, ServiceType::Wifi),
            vec![
                TechnologyState::Blocked,
                TechnologyState::Available,
                TechnologyState::Enabled,
            ]
        );
    }

    #[test]
    fn test_switch_keeps_technology_alive() {
        let mut core = new_core();
        core.add_rfkill(0, ServiceType::Bluetooth, false, false).unwrap();
        assert_eq!(
            core.technologies().find(ServiceType::Bluetooth).unwrap().state(),
            TechnologyState::Offline
        );

        core.remove_rfkill(0).unwrap();
        assert!(core.technologies().find(ServiceType::Bluetooth).is_none());
        assert!(matches!(core.update_rfkill(0, true, false), Err(NetcoreError::NoSuchEntity(_))));
    }

    #[test]
    fn test_offline_mode_powers_down_and_restores() {
        let log = call_log();
        let mut core = new_core();
        core.register_device_driver(Arc::new(RecordingDriver::new("any", None, &log)))
            .unwrap();
        let eth = add_device(&mut core, "dev_eth0", "eth0", DeviceType::Ethernet);
        let wlan = add_device(&mut core, "dev_wlan0", "wlan0", DeviceType::Wifi);

        core.set_offline_mode(true).unwrap();
        assert!(!core.device(eth).unwrap().powered());
        assert!(!core.device(wlan).unwrap().powered());
        assert_eq!(
            core.technologies().find(ServiceType::Wifi).unwrap().state(),
            TechnologyState::Available
        );

        core.set_offline_mode(false).unwrap();
        assert!(core.device(eth).unwrap().powered());
        assert!(core.device(wlan).unwrap().powered());
    }
}

// =============================================================================
// Persistence
// =============================================================================

mod persistence_tests {
    use super::*;

    #[test]
    fn test_power_choice_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let log = call_log();

        {
            let store = ProfileStore::new(dir.path(), "default");
            let mut core = NetCore::new(NetcoreConfig::default(), Box::new(store));
            core.register_device_driver(Arc::new(RecordingDriver::new("wired", None, &log)))
                .unwrap();
            let id = add_device(&mut core, "dev_eth0", "eth0", DeviceType::Ethernet);
            core.disable_persistent(id).unwrap();
            core.shutdown();
        }

        let store = ProfileStore::new(dir.path(), "default");
        let mut core = NetCore::new(NetcoreConfig::default(), Box::new(store));
        core.register_device_driver(Arc::new(RecordingDriver::new("wired", None, &log)))
            .unwrap();
        let id = add_device(&mut core, "dev_eth0", "eth0", DeviceType::Ethernet);

        assert!(!core.device(id).unwrap().powered_persistent());
        assert!(!core.device(id).unwrap().powered());
        assert_eq!(count(&log, "enable"), 1);
    }

    #[test]
    fn test_offline_mode_survives_restart() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = ProfileStore::new(dir.path(), "travel");
            let mut core = NetCore::new(NetcoreConfig::default(), Box::new(store));
            core.set_offline_mode(true).unwrap();
        }

        let store = ProfileStore::new(dir.path(), "travel");
        let core = NetCore::new(NetcoreConfig::default(), Box::new(store));
        assert!(core.offline_mode());

        let other = NetCore::new(
            NetcoreConfig::default(),
            Box::new(ProfileStore::new(dir.path(), "default")),
        );
        assert!(!other.offline_mode());
    }
}

// =============================================================================
// Tethering and Regulatory Domain
// =============================================================================

mod technology_tests {
    use super::*;

    fn sharing_core(log: &common::CallLog) -> NetCore {
        let mut config = NetcoreConfig::default();
        config.tethering.bridge = Some("tether".to_string());
        let mut core = NetCore::new(config, Box::new(MemoryStore::new()));
        core.technologies_mut()
            .register_driver(Arc::new(SharingDriver::new(ServiceType::Wifi, log)))
            .unwrap();
        core.register_device_driver(Arc::new(RecordingDriver::new("wifi", None, log)))
            .unwrap();
        add_device(&mut core, "dev_wlan0", "wlan0", DeviceType::Wifi);
        core
    }

    #[test]
    fn test_wifi_tethering_requires_credentials() {
        let log = call_log();
        let mut core = sharing_core(&log);
        let mut rx = core.notifier().subscribe();

        assert!(matches!(
            core.set_technology_property(ServiceType::Wifi, "Tethering", &json!(true)),
            Err(NetcoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            core.set_technology_property(ServiceType::Wifi, "TetheringPassphrase", &json!("short")),
            Err(NetcoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            core.set_technology_property(ServiceType::Wifi, "Tethering", &json!("yes")),
            Err(NetcoreError::InvalidArgument(_))
        ));

        core.set_technology_property(ServiceType::Wifi, "TetheringIdentifier", &json!("hotspot"))
            .unwrap();
        core.set_technology_property(ServiceType::Wifi, "TetheringPassphrase", &json!("secret123"))
            .unwrap();
        core.set_technology_property(ServiceType::Wifi, "Tethering", &json!(true))
            .unwrap();
        assert!(log
            .lock()
            .unwrap()
            .contains(&"sharing tethering hotspot tether true".to_string()));

        core.tethering_notify(ServiceType::Wifi, true);
        let properties = core.technology_properties(ServiceType::Wifi).unwrap();
        assert!(properties.tethering);
        assert_eq!(properties.tethering_identifier.as_deref(), Some("hotspot"));

        assert!(matches!(
            core.set_technology_property(ServiceType::Wifi, "Tethering", &json!(true)),
            Err(NetcoreError::AlreadyInProgress(_))
        ));

        let events = drain(&mut rx);
        assert!(events.contains(&CoreEvent::TetheringEnabled));
        assert!(events.contains(&CoreEvent::TetheringChanged {
            technology: ServiceType::Wifi,
            enabled: true,
        }));
    }

    #[test]
    fn test_properties_serialize_pascal_case() {
        let log = call_log();
        let core = sharing_core(&log);

        let value = serde_json::to_value(core.technology_properties(ServiceType::Wifi).unwrap())
            .unwrap();
        assert_eq!(value["Name"], "WiFi");
        assert_eq!(value["Type"], "wifi");
        assert_eq!(value["State"], "enabled");
        assert_eq!(value["Tethering"], false);
        assert!(value.get("TetheringIdentifier").is_none());
    }

    #[test]
    fn test_regulatory_domain() {
        let log = call_log();
        let mut core = sharing_core(&log);

        core.set_regdom("DE").unwrap();
        assert!(log.lock().unwrap().contains(&"sharing regdom DE".to_string()));
        core.regdom_notify(ServiceType::Wifi, Some("DE"));
        assert_eq!(
            core.technologies().find(ServiceType::Wifi).unwrap().regdom(),
            Some("DE")
        );

        core.set_regdom("XX").unwrap();
        assert!(matches!(core.set_regdom("de"), Err(NetcoreError::InvalidArgument(_))));

        core.regdom_notify(ServiceType::Wifi, None);
        assert_eq!(core.technologies().find(ServiceType::Wifi).unwrap().regdom(), None);
    }

    #[test]
    fn test_interfaces_hold_references() {
        let log = call_log();
        let mut core = new_core();
        core.technologies_mut()
            .register_driver(Arc::new(SharingDriver::new(ServiceType::Bluetooth, &log)))
            .unwrap();

        core.technologies_mut()
            .add_interface(ServiceType::Bluetooth, 7, "bnep0", None)
            .unwrap();
        assert_eq!(
            core.technologies().find(ServiceType::Bluetooth).unwrap().driver_name(),
            Some("sharing")
        );

        core.technologies_mut()
            .remove_interface(ServiceType::Bluetooth, 7, "bnep0");
        assert!(core.technologies().find(ServiceType::Bluetooth).is_none());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["sharing probe bluetooth".to_string(), "sharing remove bluetooth".to_string()]
        );
    }
}

// =============================================================================
// Link Detection
// =============================================================================

mod detect_tests {
    use super::*;

    #[tokio::test]
    async fn test_links_become_devices() {
        let log = call_log();
        let mut daemon = Daemon::new(new_core());
        daemon
            .core_mut()
            .register_device_driver(Arc::new(RecordingDriver::new("any", None, &log)))
            .unwrap();
        let mut rx = daemon.core().notifier().subscribe();
        let handle = daemon.handle();

        handle.send(CoreCommand::NewLink(wired(2, "eth0"))).unwrap();
        handle.send(CoreCommand::NewLink(wireless(3, "wlan0"))).unwrap();
        handle.send(CoreCommand::NewLink(wired(4, "bnep0"))).unwrap();
        handle
            .send(CoreCommand::NewLink(LinkEvent::new(5, libc::ARPHRD_NONE, "hso0")))
            .unwrap();
        handle.send(CoreCommand::NewLink(wired(2, "eth0"))).unwrap();
        handle.shutdown().unwrap();

        daemon.run().await;

        let added: Vec<Option<String>> = drain(&mut rx)
            .into_iter()
            .filter_map(|event| match event {
                CoreEvent::DeviceAdded { interface, .. } => Some(interface),
                _ => None,
            })
            .collect();
        assert_eq!(
            added,
            vec![
                Some("eth0".to_string()),
                Some("wlan0".to_string()),
                Some("hso0".to_string()),
            ]
        );
        assert_eq!(count(&log, "probe"), 3);
    }
}
