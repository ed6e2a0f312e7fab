fn main() {
    idol::client::build_client_stub("../../idl/store.idol", "client_stub.rs").unwrap();
}
