//! Tests for the transport layer over real sockets.

#[cfg(test)]
mod tests {
    use crate::protocol::{ErrorKind, Message, Notification, Request, Response};
    use crate::transport::{connect, split};
    use futures::{SinkExt, StreamExt};
    use rmpv::Value;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_messages_cross_a_socket_in_order() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (mut reader, _writer) = split(stream);
            let mut received = vec![];
            while let Some(message) = reader.next().await {
                received.push(message.unwrap());
            }
            received
        });

        let stream = connect("127.0.0.1", port).await.unwrap();
        let (reader, mut writer) = split(stream);
        let sent = vec![
            Message::Request(Request::new(0, "add", vec![Value::from(2), Value::from(3)])),
            Message::Notification(Notification::new("log", vec![Value::from("hi")])),
            Message::Response(Response::success(0, Value::from(5))),
        ];
        for message in &sent {
            writer.send(message.clone()).await.unwrap();
        }
        drop(writer);
        drop(reader);

        assert_eq!(server.await.unwrap(), sent);
    }

    #[tokio::test]
    async fn test_message_split_across_writes_is_reassembled() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let message = Message::Request(Request::new(
            11,
            "echo",
            vec![Value::from("a fairly long string argument to split across writes")],
        ));
        let bytes = crate::transport::MessageCodec::encode_message(message.clone()).unwrap();

        let writer = tokio::spawn(async move {
            let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port)).await.unwrap();
            let (head, tail) = bytes.split_at(bytes.len() / 2);
            stream.write_all(head).await.unwrap();
            stream.flush().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            stream.write_all(tail).await.unwrap();
        });

        let (stream, _) = listener.accept().await.unwrap();
        let (mut reader, _writer) = split(stream);
        let received = reader.next().await.unwrap().unwrap();

        assert_eq!(received, message);
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = connect("127.0.0.1", port).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
    }
}
