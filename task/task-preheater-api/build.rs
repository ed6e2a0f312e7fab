fn main() {
    idol::client::build_client_stub("../../idl/preheater.idol", "client_stub.rs").unwrap();
}
