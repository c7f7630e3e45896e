use std::time::Duration;

use comms::{Endpoint, Job, Multiplex, PollMux, transport::bind_udp};
use fractal_farm::{Canvas, Tile, View, pgm};
use tokio_test::assert_ok;
use worker::{Handler, Server, kernel};
use workforce::{Owner, WorkerSpec, Workforce};

fn render(view: View, chunk: u16) -> Canvas {
    tokio_test::block_on(async move {
        let (mut worker_in, worker_out) = assert_ok!(bind_udp("127.0.0.1:0"));
        let worker_addr = assert_ok!(worker_in.local_addr());
        let mut server = Server::new(Handler::new(1), worker_out, Some(Duration::from_millis(200)));

        let (mut inbound, outbound) = assert_ok!(bind_udp("127.0.0.1:0"));
        let tiles = view.tiles(chunk, chunk);
        let canvas = Canvas::new(view.width, view.height, view.pixel_width(), 9, tiles.len());

        let roster = vec![WorkerSpec {
            name: worker_addr.to_string(),
            endpoint: Endpoint::Net(worker_addr),
            timeout: Duration::from_secs(5),
        }];
        let mut wf = Workforce::new(roster, outbound, canvas);

        let job = view.job();
        wf.begin_batch();
        for rect in tiles {
            let params = Job { rect, ..job }.to_bytes();
            assert_ok!(wf.dispatch(Owner(0), Tile { rect, tag: 9 }, &params));
        }
        wf.kick();

        let mut worker_mux = PollMux::new(Duration::from_millis(50));
        let mut client_mux = worker_mux;
        let (served, rendered) = tokio::join!(
            worker_mux.run(&mut worker_in, &mut server),
            client_mux.run(&mut inbound, &mut wf),
        );
        assert_ok!(served);
        assert_ok!(rendered);

        assert_eq!(wf.batches(), 1);
        wf.into_client()
    })
}

#[test]
fn renders_the_default_view() {
    let view = View::default();
    let canvas = render(view, 32);

    let (expected, _) = kernel::render(&view.job());
    assert_eq!(canvas.pixels(), &expected[..]);

    let mut out = Vec::new();
    assert_ok!(pgm::write(&mut out, 64, 24, 249, canvas.pixels(), false));
    assert!(out.starts_with(b"P5\n64 24\n249\n"));
    assert_eq!(out.len(), b"P5\n64 24\n249\n".len() + 64 * 24);
}

#[test]
fn renders_a_julia_set_with_two_byte_counts() {
    let view = View {
        width: 40,
        height: 30,
        center: comms::Complex::new(0.0, 0.0),
        range: 3.0,
        julia: Some(comms::Complex::new(-0.1, 0.1)),
        iterations: 600,
        ..Default::default()
    };
    let canvas = render(view, 16);

    let (expected, _) = kernel::render(&view.job());
    assert_eq!(canvas.pixels(), &expected[..]);
    assert!(canvas.pixels().iter().any(|&c| c > 255));
}
