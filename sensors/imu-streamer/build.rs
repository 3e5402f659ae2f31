fn main() {
    // Emits the ESP-IDF link args and cfgs for the firmware binary
    embuild::espidf::sysenv::output();

    for var in ["WIFI_SSID", "WIFI_PASSWORD", "WS_ENDPOINT", "WIFI_MAX_RETRY"] {
        println!("cargo:rerun-if-env-changed={}", var);
    }
}
