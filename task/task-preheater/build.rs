fn main() {
    idol::server::build_server_support(
        "../../idl/preheater.idol",
        "server_stub.rs",
        idol::server::ServerStyle::InOrder,
    )
    .unwrap();
}
