use helpdesk::api::ticket::Number;

#[test]
fn formats_with_six_digit_padding() {
    assert_eq!(Number::new("IN", 5).to_string(), "#IN-000005");
    assert_eq!(Number::new("SI", 1_234_567).to_string(), "#SI-1234567");
}

#[test]
fn parses_display_form() {
    let number = "#RR-000042".parse::<Number>().unwrap();

    assert_eq!(number.prefix(), "RR");
    assert_eq!(number.sequence(), 42);
    assert_eq!(number.to_string(), "#RR-000042");
}

#[test]
fn rejects_malformed_numbers() {
    for s in ["RR-000042", "#RR000042", "#rr-000042", "#RRR-000042", "#RR-42", "#RR-00004x"] {
        assert!(s.parse::<Number>().is_err(), "{s}");
    }
}

#[test]
fn serializes_as_string() {
    let number = Number::new("BR", 7);

    assert_eq!(serde_json::to_value(&number).unwrap(), "#BR-000007");
    assert_eq!(
        serde_json::from_str::<Number>("\"#BR-000007\"").unwrap(),
        number,
    );
}
