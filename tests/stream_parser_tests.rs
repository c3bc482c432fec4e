use markpilot::api::stream::StreamParser;
use markpilot::types::StreamEvent;

#[test]
fn test_fragmented_events() {
    let mut parser = StreamParser::new();

    let events = parser.process(br#"{"type":"message-chunk","id":"m1","con"#);
    assert!(events.is_empty());

    let events = parser.process(b"tent\":\"Hi\"}\n{\"type\":\"tool-result\"}\n");
    assert_eq!(events.len(), 2);
    match &events[0] {
        StreamEvent::MessageChunk(chunk) => {
            assert_eq!(chunk.id, "m1");
            assert_eq!(chunk.content.as_deref(), Some("Hi"));
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(matches!(events[1], StreamEvent::ToolResult(_)));
}

#[test]
fn test_parse_error_handling() {
    let mut parser = StreamParser::new();

    let events = parser.process(b"{invalid json}\n{\"type\":\"interrupt\",\"id\":\"i1\",\"tool_name\":\"write_file\"}\n");
    assert_eq!(events.len(), 1);
    match &events[0] {
        StreamEvent::Interrupt(descriptor) => {
            assert_eq!(descriptor.id, "i1");
            assert_eq!(descriptor.parameters, None);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn test_tool_call_chunks_are_decoded() {
    let mut parser = StreamParser::new();

    let line = br#"{"type":"message-chunk","id":"m1","tool_call_chunks":[{"index":1,"name":"edit_lines","args":"{\"path\":\"a.","id":"call_7"}]}"#;
    let mut events = parser.process(line);
    assert!(events.is_empty());
    events.extend(parser.finish());

    let StreamEvent::MessageChunk(chunk) = &events[0] else {
        panic!("expected message chunk");
    };
    let fragment = &chunk.tool_call_chunks[0];
    assert_eq!(fragment.index, 1);
    assert_eq!(fragment.name.as_deref(), Some("edit_lines"));
    assert_eq!(fragment.args.as_deref(), Some("{\"path\":\"a."));
    assert_eq!(fragment.id.as_deref(), Some("call_7"));
}

#[test]
fn test_unknown_event_types_are_tolerated() {
    let mut parser = StreamParser::new();
    let events = parser.process(b"{\"type\":\"usage\",\"tokens\":12}\n");
    assert_eq!(events, vec![StreamEvent::Unknown]);
}
